// Jolokia HTTP client
//
// Wraps `reqwest::Client` with Jolokia URL construction, envelope
// unwrapping, and optional basic auth. Every public method returns the
// unwrapped `value` payload -- the envelope is stripped before the caller
// sees it.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{JolokiaRequest, JolokiaResponse, ListValue, MBeanAttribute, flatten_list};
use crate::transport::TransportConfig;

/// Raw HTTP client for a Jolokia agent (`https://host:8778/jolokia/`).
pub struct JolokiaClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<(String, SecretString)>,
    timeout_secs: u64,
}

impl JolokiaClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// The `base_url` is the agent endpoint; a trailing slash is added if
    /// missing so relative paths resolve underneath it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url);
        client.timeout_secs = transport.timeout.as_secs();
        Ok(client)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            credentials: None,
            timeout_secs: TransportConfig::default().timeout.as_secs(),
        }
    }

    /// Send HTTP basic auth with every request.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    /// The agent base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Operations ───────────────────────────────────────────────────

    /// List every readable attribute of every MBean the agent exposes.
    pub async fn list(&self) -> Result<Vec<MBeanAttribute>, Error> {
        let url = self.base_url.join("list")?;
        debug!(%url, "listing mbeans");
        let request = self.authorize(self.http.get(url));
        let list: ListValue = self.send(request).await?;
        Ok(flatten_list(list))
    }

    /// Read one attribute.
    pub async fn read(&self, mbean: &str, attribute: &str) -> Result<Value, Error> {
        trace!(mbean, attribute, "read");
        self.execute(&JolokiaRequest::Read { mbean, attribute })
            .await
    }

    /// Write one attribute. Returns the previous value reported by the agent.
    pub async fn write(&self, mbean: &str, attribute: &str, value: &Value) -> Result<Value, Error> {
        trace!(mbean, attribute, %value, "write");
        self.execute(&JolokiaRequest::Write {
            mbean,
            attribute,
            value,
        })
        .await
    }

    // ── Transport mechanics ──────────────────────────────────────────

    async fn execute(&self, request: &JolokiaRequest<'_>) -> Result<Value, Error> {
        let builder = self.authorize(self.http.post(self.base_url.clone()).json(request));
        self.send(builder).await
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password.expose_secret())),
            None => builder,
        }
    }

    /// Send a request and unwrap the Jolokia envelope into `T`.
    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, Error> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                Error::Transport(e)
            }
        })?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: format!("agent returned HTTP {status}"),
            });
        }

        let response = response.error_for_status()?;
        let body = response.text().await?;

        let envelope: JolokiaResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        if envelope.status != 200 {
            return Err(Error::Jolokia {
                status: envelope.status,
                error_type: envelope.error_type,
                message: envelope
                    .error
                    .unwrap_or_else(|| format!("request failed with status {}", envelope.status)),
            });
        }

        serde_json::from_value(envelope.value).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = JolokiaClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://localhost:8778/jolokia").unwrap(),
        );
        assert_eq!(client.base_url().as_str(), "http://localhost:8778/jolokia/");
        assert_eq!(
            client.base_url().join("list").unwrap().as_str(),
            "http://localhost:8778/jolokia/list"
        );
    }
}
