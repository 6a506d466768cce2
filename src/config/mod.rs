//! Configuration loading and management
//!
//! ```yaml
//! api:
//!   url: http://localhost:8080
//!   path: api
//!   version: v1
//!   timeout_secs: 30
//! cache:
//!   default_freshness_secs: 60
//!   freshness_overrides:
//!     locations: 120
//! events:
//!   capacity: 1024
//! server:
//!   bind_addr: 127.0.0.1:3000
//! session:
//!   file: .orgpilot/session.json
//! ```
//!
//! Environment variables override the file: `ORGPILOT_API_URL`,
//! `ORGPILOT_API_PATH`, `ORGPILOT_API_VERSION`, `ORGPILOT_BIND_ADDR`.

use crate::api::endpoints::Endpoint;
use crate::core::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_API_URL: &str = "ORGPILOT_API_URL";
pub const ENV_API_PATH: &str = "ORGPILOT_API_PATH";
pub const ENV_API_VERSION: &str = "ORGPILOT_API_VERSION";
pub const ENV_BIND_ADDR: &str = "ORGPILOT_BIND_ADDR";

/// Backend location and request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default = "default_api_path")]
    pub path: String,

    #[serde(default = "default_api_version")]
    pub version: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_path() -> String {
    "api".to_string()
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            path: default_api_path(),
            version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// `{url}/{path}/{version}` with stray slashes removed
    pub fn base_url(&self) -> String {
        let segments = [self.path.trim_matches('/'), self.version.trim_matches('/')];
        let mut base = self.url.trim_end_matches('/').to_string();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            base.push('/');
            base.push_str(segment);
        }
        base
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window of reads without a built-in or configured override
    #[serde(default = "default_freshness_secs")]
    pub default_freshness_secs: u64,

    /// Endpoint name -> freshness window in seconds
    #[serde(default)]
    pub freshness_overrides: HashMap<String, u64>,
}

fn default_freshness_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_freshness_secs: default_freshness_secs(),
            freshness_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Freshness window for reads of `endpoint`
    ///
    /// Configured override first, then the endpoint's built-in window, then
    /// the default.
    pub fn freshness_for(&self, endpoint: Endpoint) -> Duration {
        if let Some(secs) = self.freshness_overrides.get(endpoint.name()) {
            return Duration::from_secs(*secs);
        }
        endpoint
            .default_freshness()
            .unwrap_or(Duration::from_secs(self.default_freshness_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "server.bind_addr".to_string(),
                value: self.bind_addr.clone(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the session token is persisted; in memory when absent
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Complete client and edge server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgPilotConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl OrgPilotConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.to_string(),
            },
            _ => ConfigError::IoError {
                message: e.to_string(),
            },
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.to_string()),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("parsing OrgPilot configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, then apply environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.url = url;
        }
        if let Some(path) = lookup(ENV_API_PATH) {
            self.api.path = path;
        }
        if let Some(version) = lookup(ENV_API_VERSION) {
            self.api.version = version;
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.url.starts_with("http://") || self.api.url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api.url".to_string(),
                value: self.api.url.clone(),
                message: "must be an http(s) URL".to_string(),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_secs".to_string(),
                value: "0".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if let Some(name) = self
            .cache
            .freshness_overrides
            .keys()
            .find(|name| Endpoint::from_name(name).is_none())
        {
            return Err(ConfigError::InvalidValue {
                field: "cache.freshness_overrides".to_string(),
                value: name.clone(),
                message: "unknown endpoint".to_string(),
            });
        }
        self.server.socket_addr()?;
        Ok(())
    }

    pub fn base_url(&self) -> String {
        self.api.base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrgPilotConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8080/api/v1");
        assert_eq!(config.cache.default_freshness_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_serialization() {
        let config = OrgPilotConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = OrgPilotConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = OrgPilotConfig::from_yaml_str(
            r#"
api:
  url: https://backend.example.com/
  version: v2
"#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://backend.example.com/api/v2");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_freshness_resolution() {
        let mut cache = CacheConfig::default();
        assert_eq!(
            cache.freshness_for(Endpoint::Organizations),
            Duration::from_secs(300)
        );
        assert_eq!(cache.freshness_for(Endpoint::Locations), Duration::from_secs(60));

        cache
            .freshness_overrides
            .insert("organizations".to_string(), 5);
        assert_eq!(
            cache.freshness_for(Endpoint::Organizations),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = OrgPilotConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_API_URL => Some("https://staging.example.com".to_string()),
            ENV_BIND_ADDR => Some("0.0.0.0:8081".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url(), "https://staging.example.com/api/v1");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8081");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(OrgPilotConfig::from_yaml_str("api:\n  url: ftp://nope\n").is_err());
        assert!(OrgPilotConfig::from_yaml_str("api:\n  timeout_secs: 0\n").is_err());
        assert!(
            OrgPilotConfig::from_yaml_str("cache:\n  freshness_overrides:\n    bogus: 1\n").is_err()
        );
        assert!(OrgPilotConfig::from_yaml_str("server:\n  bind_addr: nowhere\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = OrgPilotConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
