//! Configuration
//!
//! Settings come from the environment, with defaults for local development.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::BackendKind;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_URL_VAR: &str = "CONSOLE_API_URL";
pub const BACKEND_VAR: &str = "CONSOLE_AUTH_BACKEND";
pub const DATA_DIR_VAR: &str = "CONSOLE_DATA_DIR";
pub const TIMEOUT_VAR: &str = "CONSOLE_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Build from `CONSOLE_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(url) = lookup(API_URL_VAR) {
            config.api_base_url = url;
        }
        if let Some(backend) = lookup(BACKEND_VAR) {
            config.backend = backend.parse().map_err(ConfigError::Backend)?;
        }
        if let Some(dir) = lookup(DATA_DIR_VAR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(TIMEOUT_VAR) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Timeout(secs.clone()))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ApiUrl(self.api_base_url.clone()));
        }
        Ok(())
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("DeviceConsole")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API URL: {0}")]
    ApiUrl(String),

    #[error("Invalid auth backend: {0}")]
    Backend(String),

    #[error("Invalid timeout: {0}")]
    Timeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.backend, BackendKind::Token);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            (API_URL_VAR, "https://console.example.com"),
            (BACKEND_VAR, "local"),
            (DATA_DIR_VAR, "/tmp/console"),
            (TIMEOUT_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://console.example.com");
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/console"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(BACKEND_VAR, "ldap")])),
            Err(ConfigError::Backend(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(API_URL_VAR, "localhost:5000")])),
            Err(ConfigError::ApiUrl(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(TIMEOUT_VAR, "soon")])),
            Err(ConfigError::Timeout(_))
        ));
    }
}
