#![allow(clippy::unwrap_used)]
// Loading and translation tests backed by temporary config files.

use std::time::Duration;

use secrecy::ExposeSecret;

use attrbridge_api::TlsMode;
use attrbridge_config::{
    Config, ConfigError, SourceSection, load_config_from, resolve_credentials, save_config,
    source_url, to_namespace_config, to_transport_config,
};
use attrbridge_core::RecoveryPolicy;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.namespace.refresh_ms, 1000);
    assert_eq!(cfg.namespace.root_name, "attributes");

    let ns = to_namespace_config(&cfg).unwrap();
    assert_eq!(ns.namespace_index, 2);
    assert_eq!(ns.recovery, RecoveryPolicy::Manual);
}

#[test]
fn file_values_override_defaults() {
    let (_dir, path) = write_config(
        r#"
[namespace]
namespace_index = 4
refresh_ms = 250
recovery = "probe"
probe_every_cycles = 3

[source]
url = "http://localhost:8778/jolokia/"
timeout = 5
ca_cert = "/etc/ssl/agent.pem"

[filter]
exclude_domains = ["java.lang"]
"#,
    );

    let cfg = load_config_from(&path).unwrap();
    let ns = to_namespace_config(&cfg).unwrap();
    assert_eq!(ns.namespace_index, 4);
    assert_eq!(ns.refresh_interval, Duration::from_millis(250));
    assert_eq!(ns.recovery, RecoveryPolicy::Probe { every_cycles: 3 });
    assert!(!ns.filter.accepts("java.lang"));
    assert_eq!(ns.root_name, "attributes");

    let transport = to_transport_config(&cfg.source);
    assert_eq!(transport.timeout, Duration::from_secs(5));
    assert!(matches!(transport.tls, TlsMode::CustomCa(_)));
    assert_eq!(
        source_url(&cfg.source, None).unwrap().as_str(),
        "http://localhost:8778/jolokia/"
    );
}

#[test]
fn unknown_recovery_is_rejected() {
    let (_dir, path) = write_config("[namespace]\nrecovery = \"sometimes\"\n");
    let cfg = load_config_from(&path).unwrap();
    assert!(matches!(
        to_namespace_config(&cfg),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn zero_refresh_is_rejected() {
    let (_dir, path) = write_config("[namespace]\nrefresh_ms = 0\n");
    let cfg = load_config_from(&path).unwrap();
    assert!(to_namespace_config(&cfg).is_err());
}

#[test]
fn malformed_toml_is_a_figment_error() {
    let (_dir, path) = write_config("[namespace\nrefresh_ms = ");
    assert!(matches!(
        load_config_from(&path),
        Err(ConfigError::Figment(_))
    ));
}

#[test]
fn url_override_wins_and_missing_url_errors() {
    let source = SourceSection::default();
    assert!(matches!(source_url(&source, None), Err(ConfigError::NoSource)));
    assert_eq!(
        source_url(&source, Some("http://agent:8778/jolokia")).unwrap().host_str(),
        Some("agent")
    );
    assert!(source_url(&source, Some("not a url")).is_err());
}

#[test]
fn credentials_need_a_password() {
    assert!(resolve_credentials(&SourceSection::default()).unwrap().is_none());

    let with_password = SourceSection {
        username: Some("monitor".into()),
        password: Some("s3cret".into()),
        ..SourceSection::default()
    };
    let (user, pw) = resolve_credentials(&with_password).unwrap().unwrap();
    assert_eq!(user, "monitor");
    assert_eq!(pw.expose_secret(), "s3cret");

    let without = SourceSection {
        username: Some("monitor".into()),
        password_env: Some("ATTRBRIDGE_TEST_UNSET_PASSWORD_VAR".into()),
        ..SourceSection::default()
    };
    assert!(resolve_credentials(&without).is_err());
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut cfg = Config::default();
    cfg.source.url = Some("http://localhost:8778/jolokia/".into());
    cfg.filter.include_domains = vec!["app".into()];

    save_config(&cfg, &path).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), cfg);
}
