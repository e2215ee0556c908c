#![allow(clippy::unwrap_used)]
// Integration tests for `JolokiaClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use attrbridge_api::{Error, JolokiaClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, JolokiaClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/jolokia", server.uri())).unwrap();
    let client = JolokiaClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn ok(value: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": 200, "value": value }))
}

// ── List ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_flattens_domains() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/jolokia/list"))
        .respond_with(ok(json!({
            "app": {
                "name=main,type=Cache": {
                    "attr": {
                        "size": { "type": "int", "rw": true, "desc": "Entries" },
                        "label": { "type": "java.lang.String", "rw": false, "desc": "" }
                    }
                }
            },
            "java.lang": {
                "type=Runtime": {
                    "attr": { "Uptime": { "type": "long", "rw": false } }
                }
            }
        })))
        .mount(&server)
        .await;

    let attrs = client.list().await.unwrap();
    assert_eq!(attrs.len(), 3);

    let size = attrs.iter().find(|a| a.name == "size").unwrap();
    assert_eq!(size.mbean, "app:name=main,type=Cache");
    assert_eq!(size.type_name, "int");
    assert!(size.writable);
    assert_eq!(size.description.as_deref(), Some("Entries"));

    let uptime = attrs.iter().find(|a| a.name == "Uptime").unwrap();
    assert_eq!(uptime.mbean, "java.lang:type=Runtime");
    assert!(!uptime.writable);
}

// ── Read / write ────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_unwraps_value() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .and(body_partial_json(json!({
            "type": "read",
            "mbean": "app:type=Cache,name=main",
            "attribute": "size"
        })))
        .respond_with(ok(json!(10)))
        .mount(&server)
        .await;

    let value = client.read("app:type=Cache,name=main", "size").await.unwrap();
    assert_eq!(value, json!(10));
}

#[tokio::test]
async fn test_write_sends_value() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .and(body_partial_json(json!({
            "type": "write",
            "attribute": "size",
            "value": 20
        })))
        .respond_with(ok(json!(12)))
        .expect(1)
        .mount(&server)
        .await;

    let previous = client
        .write("app:type=Cache,name=main", "size", &json!(20))
        .await
        .unwrap();
    assert_eq!(previous, json!(12));
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_envelope_error_is_reported() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 500,
            "error_type": "javax.management.RuntimeMBeanException",
            "error": "getter threw"
        })))
        .mount(&server)
        .await;

    let err = client.read("app:type=Cache", "size").await.unwrap_err();
    assert!(
        matches!(&err, Error::Jolokia { status: 500, .. }),
        "expected Jolokia error, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_attribute_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 404,
            "error_type": "javax.management.AttributeNotFoundException",
            "error": "No such attribute: nope"
        })))
        .mount(&server)
        .await;

    let err = client.read("app:type=Cache", "nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/jolokia/list"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_garbage_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let result = client.read("app:type=Cache", "size").await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert!(body.contains("proxy")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/jolokia/", server.uri())).unwrap();
    let client = JolokiaClient::with_client(reqwest::Client::new(), base_url)
        .with_basic_auth("monitor", "s3cret".to_string().into());

    Mock::given(method("POST"))
        .and(path("/jolokia/"))
        .and(basic_auth("monitor", "s3cret"))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.read("app:type=Flag", "enabled").await.unwrap();
    assert_eq!(value, json!(true));
}
