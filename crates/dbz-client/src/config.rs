//! Client and service configuration, loaded from TOML.
//!
//! ```
//! use dbz_client::config::ClientConfig;
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     client_id = "reporting"
//!     request_timeout_ms = 2500
//! "#).unwrap();
//! assert_eq!(config.client_id, "reporting");
//! assert_eq!(config.response_threads, 1);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("PARSE: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("INVALID: {0}")]
    Invalid(String),
}

/// Generates a client id unlikely to collide with any other process.
pub fn random_client_id() -> String {
    format!("client-{:016x}", rand::random::<u64>())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Identifies this client in request headers and consumer groups.
    pub client_id: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Worker threads consuming `partial-responses`.
    pub response_threads: usize,
    /// How often expired requests are swept.
    pub reaper_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: random_client_id(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            response_threads: 1,
            reaper_interval_ms: 500,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<ClientConfig, ConfigError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() || self.client_id.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "client_id must be non-empty and free of '/': {:?}",
                self.client_id
            )));
        }
        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.response_threads == 0 {
            return Err(ConfigError::Invalid("response_threads must be at least 1".to_string()));
        }
        if self.reaper_interval_ms == 0 {
            return Err(ConfigError::Invalid("reaper_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

/// Subscription settings for a storage or batch service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Consumer group shared by every instance of the service.
    pub group_id: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    1
}

impl ServiceConfig {
    pub fn new(group_id: impl Into<String>) -> ServiceConfig {
        ServiceConfig {
            group_id: group_id.into(),
            threads: default_threads(),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> ServiceConfig {
        self.threads = threads.max(1);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<ServiceConfig, ConfigError> {
        let config: ServiceConfig = toml::from_str(text)?;
        if config.group_id.is_empty() || config.threads == 0 {
            return Err(ConfigError::Invalid(
                "group_id must be non-empty and threads at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert!(config.client_id.starts_with("client-"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn client_ids_differ() {
        assert_ne!(random_client_id(), random_client_id());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ClientConfig::from_toml_str("response_threads = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str(r#"client_id = "a/b""#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("request_timeout_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn service_config() {
        let config = ServiceConfig::from_toml_str(r#"group_id = "entity-storage""#).unwrap();
        assert_eq!(config.threads, 1);
        assert_eq!(ServiceConfig::new("x").with_threads(0).threads, 1);
        assert!(ServiceConfig::from_toml_str("threads = 2").is_err());
    }
}
