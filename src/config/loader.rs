use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShieldConfig {
    /// Trusted first-party frontend (scheme + host). Required.
    #[serde(default)]
    pub frontend_url: String,
    /// false = log findings but let the request through
    #[serde(default = "default_block_mode")]
    pub block_mode: bool,
    /// Largest request body buffered for inspection. Capped at
    /// `MAX_INSPECTED_BODY`, the most the proxy can replay upstream.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Replace upstream 404 responses with the monitoring page.
    #[serde(default = "default_not_found_page")]
    pub not_found_page: bool,
    #[serde(default)]
    pub beacon: BeaconConfig,
}

/// Bodies are replayed upstream from Pingora's retry buffer, which holds
/// at most 64 KiB.
pub const MAX_INSPECTED_BODY: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BeaconConfig {
    #[serde(default = "default_beacon_enabled")]
    pub enabled: bool,
    #[serde(default = "default_beacon_path")]
    pub path: String,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            enabled: default_beacon_enabled(),
            path: default_beacon_path(),
        }
    }
}

// Default value functions
fn default_block_mode() -> bool {
    true
}

fn default_max_body_size() -> usize {
    MAX_INSPECTED_BODY
}

fn default_not_found_page() -> bool {
    true
}

fn default_beacon_enabled() -> bool {
    true
}

fn default_beacon_path() -> String {
    "/api/security/monitor/".to_string()
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            frontend_url: String::new(),
            block_mode: default_block_mode(),
            max_body_size: default_max_body_size(),
            not_found_page: default_not_found_page(),
            beacon: BeaconConfig::default(),
        }
    }
}

impl ShieldConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// The frontend URL must be an absolute http(s) origin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.frontend_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid(
                "frontend_url is required (config file, --frontend-url or FRONTEND_URL)"
                    .to_string(),
            ));
        }

        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| {
                ConfigError::Invalid(format!("frontend_url must start with http(s)://: {}", url))
            })?;
        if host.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Invalid(format!(
                "frontend_url has no host: {}",
                url
            )));
        }

        if self.max_body_size == 0 || self.max_body_size > MAX_INSPECTED_BODY {
            return Err(ConfigError::Invalid(format!(
                "max_body_size must be between 1 and {} bytes",
                MAX_INSPECTED_BODY
            )));
        }

        Ok(())
    }
}
