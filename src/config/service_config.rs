//! Service configuration file handling
//!
//! Loads and manages the ~/.config/profile-aggregator/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inbound HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound on the time spent answering one profile request
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_request_deadline() -> u64 {
    60
}

impl ServerConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_deadline_secs: default_request_deadline(),
        }
    }
}

/// Outbound HTTP client settings, shared by both providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for upstream calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for transient upstream failures (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Concurrent per-repository count requests within one fetcher
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_concurrent_requests() -> usize {
    4
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Settings for a single upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API root, without trailing slash
    pub api_url: String,

    /// Items requested per listing page
    #[serde(default = "default_page_len")]
    pub page_len: u32,
}

fn default_page_len() -> u32 {
    50
}

impl ProviderConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            page_len: default_page_len(),
        }
    }

    pub fn with_page_len(mut self, page_len: u32) -> Self {
        self.page_len = page_len;
        self
    }

    /// API root with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

fn default_github() -> ProviderConfig {
    ProviderConfig::new("https://api.github.com")
}

fn default_bitbucket() -> ProviderConfig {
    ProviderConfig::new("https://api.bitbucket.org")
}

/// profile-aggregator configuration
///
/// Represents the complete ~/.config/profile-aggregator/config.yaml file.
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default = "default_github")]
    pub github: ProviderConfig,

    #[serde(default = "default_bitbucket")]
    pub bitbucket: ProviderConfig,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            github: default_github(),
            bitbucket: default_bitbucket(),
        }
    }

    /// Load from the default path, or use built-in defaults when it doesn't exist
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::new());
        }
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::AggregatorError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            bind = %config.server.bind,
            github = %config.github.api_url,
            bitbucket = %config.bitbucket.api_url,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving configuration");

        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Write the default configuration to `path`, refusing to overwrite
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(crate::AggregatorError::Config(format!(
                "Config file already exists: {}",
                path.display()
            )));
        }

        let config = Self::new();
        config.save(path)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get the default config path (~/.config/profile-aggregator/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("profile-aggregator");
        path.push("config.yaml");
        path
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}
