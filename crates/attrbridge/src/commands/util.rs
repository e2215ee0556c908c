//! Shared helpers: config resolution and namespace construction.

use std::sync::Arc;

use tracing::debug;

use attrbridge_api::JolokiaClient;
use attrbridge_config::{
    Config, config_path, load_config_from, resolve_credentials, source_url, to_namespace_config,
    to_transport_config,
};
use attrbridge_core::{CoreError, Namespace, NodeId, TypeFactoryRegistry};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub type AgentNamespace = Namespace<JolokiaClient>;

/// Load the config file (or `--config`) and apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    let mut cfg = load_config_from(&path)?;

    if let Some(ms) = global.interval {
        cfg.namespace.refresh_ms = ms;
    }
    if let Some(secs) = global.timeout {
        cfg.source.timeout = secs;
    }
    if global.insecure {
        cfg.source.insecure = true;
    }
    Ok(cfg)
}

/// Connect to the agent and build the namespace. Polling is not started.
pub async fn open_namespace(global: &GlobalOpts, cfg: &Config) -> Result<AgentNamespace, CliError> {
    let url = source_url(&cfg.source, global.url.as_deref())?;
    let ns_config = to_namespace_config(cfg)?;
    let transport = to_transport_config(&cfg.source);

    let mut client =
        JolokiaClient::new(url.clone(), &transport).map_err(|e| CliError::ConnectionFailed {
            url: url.to_string(),
            source: Box::new(e),
        })?;
    if let Some((username, password)) = resolve_credentials(&cfg.source)? {
        client = client.with_basic_auth(username, password);
    }

    debug!(%url, "building namespace");
    Namespace::build(
        ns_config,
        Arc::new(client),
        Arc::new(TypeFactoryRegistry::with_defaults()),
    )
    .await
    .map_err(|e| match e {
        CoreError::Enumeration(source) => CliError::SourceUnavailable {
            url: url.to_string(),
            message: source.to_string(),
        },
        other => other.into(),
    })
}

/// Parse a node id, defaulting the namespace index to the namespace's own.
pub fn parse_node_id(namespace: &AgentNamespace, raw: &str) -> Result<NodeId, CliError> {
    Ok(NodeId::parse_with_default(
        raw,
        namespace.config().namespace_index,
    )?)
}

/// Render an optional value for table cells.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}
