//! Integration tests for configuration loading

use orgpilot::config::{ENV_API_PATH, ENV_API_VERSION};
use orgpilot::prelude::*;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_load_full_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
api:
  url: https://backend.example.com
  path: /core/
  version: v3
  timeout_secs: 10
cache:
  default_freshness_secs: 15
  freshness_overrides:
    locations: 120
    organization: 30
events:
  capacity: 64
server:
  bind_addr: 0.0.0.0:8080
session:
  file: /tmp/orgpilot/session.json
"#
    )
    .unwrap();

    let config = OrgPilotConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.base_url(), "https://backend.example.com/core/v3");
    assert_eq!(config.api.timeout(), Duration::from_secs(10));
    assert_eq!(config.events.capacity, 64);
    assert_eq!(config.server.socket_addr().unwrap().port(), 8080);
    assert!(config.session.file.is_some());

    assert_eq!(
        config.cache.freshness_for(Endpoint::Locations),
        Duration::from_secs(120)
    );
    assert_eq!(
        config.cache.freshness_for(Endpoint::Organization),
        Duration::from_secs(30)
    );
    assert_eq!(
        config.cache.freshness_for(Endpoint::Specializations),
        Duration::from_secs(15)
    );
    // Built-in window wins over the configured default
    assert_eq!(
        config.cache.freshness_for(Endpoint::Organizations),
        Duration::from_secs(300)
    );
}

#[test]
fn test_parse_error_names_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "api: [not, a, map").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let err = OrgPilotConfig::from_yaml_file(&path).unwrap_err();
    assert!(err.to_string().contains(&path));
}

#[test]
fn test_empty_document_is_default() {
    let config = OrgPilotConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, OrgPilotConfig::default());
}

#[test]
fn test_env_overrides_rebuild_base_url() {
    let mut config = OrgPilotConfig::default();
    config.apply_env_overrides(|key| match key {
        ENV_API_PATH => Some("gateway".to_string()),
        ENV_API_VERSION => Some("v9".to_string()),
        _ => None,
    });
    assert_eq!(config.base_url(), "http://localhost:8080/gateway/v9");
}

#[test]
fn test_client_honours_configured_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = OrgPilotConfig::default();
    config.session.file = Some(dir.path().join("nested").join("session.json"));

    let client = OrgPilotClient::builder().with_config(config).build().unwrap();
    assert!(!client.is_authenticated());
    assert_eq!(client.config().events.capacity, 1024);
}
