//! Client configuration loaded from TOML

use crate::client::{
    GenerateClient, DEFAULT_BASE_DELAY_MS, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES,
    DEFAULT_SERVER_URL, DEFAULT_TIMEOUT,
};
use crate::pipeline::DEFAULT_DOWNLOAD_FILE_NAME;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings for the generation client and download naming
///
/// Every field is optional in the file; missing ones take the defaults.
///
/// ```toml
/// server_url = "http://gpu-box:5000"
/// timeout_secs = 300
/// max_retries = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Image3dConfig {
    pub server_url: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub download_file_name: String,
}

impl Default for Image3dConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            download_file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
        }
    }
}

impl Image3dConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "server_url must be an http(s) URL, got {}",
                self.server_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        if self.download_file_name.trim().is_empty()
            || self.download_file_name.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid(format!(
                "download_file_name must be a plain file name, got {:?}",
                self.download_file_name
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the HTTP client described by this config
    pub fn client(&self) -> GenerateClient {
        GenerateClient::new(self.server_url.clone())
            .with_endpoint(self.endpoint.clone())
            .with_timeout(self.timeout())
            .with_max_retries(self.max_retries)
            .with_base_delay_ms(self.base_delay_ms)
    }
}
