//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shell_core::ManifestConfig;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin clients use to reach the shell. Requests to any other origin
    /// are never served from the store.
    #[serde(default)]
    pub public_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            public_origin: None,
        }
    }
}

/// Origin serving the application assets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub skip_tls_verify: bool,
    /// Request timeout; unset means the transport never gives up on its own
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            username: None,
            password: None,
            skip_tls_verify: false,
            timeout_secs: None,
        }
    }
}

/// Store naming and lookup policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_ignore_query")]
    pub ignore_query: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            version: default_version(),
            ignore_query: default_ignore_query(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "local" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// Per-store size limit
    #[serde(default)]
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
            quota_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upstream_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_namespace() -> String {
    "turbosign".to_string()
}

fn default_version() -> String {
    "v1.0.0".to_string()
}

fn default_ignore_query() -> bool {
    true
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/stores".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Origin the shell is served from
    pub fn public_origin(&self, port: u16) -> String {
        self.server
            .public_origin
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/shell-cache.toml").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.namespace, "turbosign");
        assert_eq!(config.cache.version, "v1.0.0");
        assert!(config.cache.ignore_query);
        assert_eq!(config.manifest.precache.len(), 11);
        assert_eq!(config.public_origin(8080), "http://localhost:8080");
        assert!(config.upstream.timeout().is_none());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 9000
public_origin = "https://sign.example.com"

[upstream]
url = "http://assets:8000"
timeout_secs = 10

[cache]
version = "v2.3.1"

[manifest]
precache = ["/index.html", "/app.js"]
runtime_patterns = ["^/app", "/static/"]

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.public_origin(9000), "https://sign.example.com");
        assert_eq!(config.upstream.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.cache.version, "v2.3.1");
        assert_eq!(config.cache.namespace, "turbosign");
        assert_eq!(config.manifest.precache, vec!["/index.html", "/app.js"]);
        assert_eq!(config.manifest.root_document, "/index.html");
        assert_eq!(config.manifest.optional.len(), 6);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, "local");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server]\nport = \"not a number\"\n").unwrap();

        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
