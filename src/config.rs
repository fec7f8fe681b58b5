use crate::error::MonitoringError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Alert rules are re-evaluated on this fixed cadence.
pub const ALERT_CHECK_INTERVAL_SECONDS: u64 = 60;

/// Health probes run on this fixed cadence.
pub const HEALTH_CHECK_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP surface binds to
    pub http_host: String,

    /// HTTP server port
    pub http_port: u16,

    /// Metrics collector settings
    pub metrics: MetricsConfig,

    /// Directory the process writes its logs to; also scanned for log volume
    pub log_dir: PathBuf,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,

    /// External dependencies probed by the health monitor
    pub dependencies: DependencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between collector ticks
    pub collection_interval_seconds: u64,

    /// Hours of snapshot history kept in memory
    pub retention_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Directory of JSONL business-event records
    pub events_dir: Option<PathBuf>,

    /// Base URL of the authentication provider
    pub auth_provider_url: Option<String>,

    /// Upper bound on a single reachability check
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            metrics: MetricsConfig::default(),
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            dependencies: DependencyConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            collection_interval_seconds: 30,
            retention_hours: 24,
        }
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            events_dir: None,
            auth_provider_url: None,
            timeout_seconds: 5,
        }
    }
}

impl MetricsConfig {
    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_seconds)
    }
}

impl DependencyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load configuration from environment variables, honouring a local .env file
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        if let Ok(interval) = env::var("METRICS_COLLECTION_INTERVAL") {
            config.metrics.collection_interval_seconds = interval
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid METRICS_COLLECTION_INTERVAL: {}", e))?;
        }

        if let Ok(hours) = env::var("METRICS_RETENTION_HOURS") {
            config.metrics.retention_hours = hours
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid METRICS_RETENTION_HOURS: {}", e))?;
        }

        if let Ok(host) = env::var("HTTP_HOST") {
            config.http_host = host;
        }

        if let Ok(port) = env::var("HTTP_PORT") {
            config.http_port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid HTTP_PORT: {}", e))?;
        }

        if let Ok(dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(dir) = env::var("EVENTS_DIR") {
            if !dir.trim().is_empty() {
                config.dependencies.events_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(url) = env::var("AUTH_PROVIDER_URL") {
            if !url.trim().is_empty() {
                config.dependencies.auth_provider_url = Some(url);
            }
        }

        if let Ok(timeout) = env::var("DEPENDENCY_TIMEOUT_SECONDS") {
            config.dependencies.timeout_seconds = timeout
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DEPENDENCY_TIMEOUT_SECONDS: {}", e))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.metrics.collection_interval_seconds == 0 {
            return Err(MonitoringError::Configuration(
                "Metrics collection interval must be greater than 0".to_string(),
            ));
        }

        if self.metrics.retention_hours == 0 {
            return Err(MonitoringError::Configuration(
                "Metrics retention must be at least one hour".to_string(),
            ));
        }

        if self.dependencies.timeout_seconds == 0 {
            return Err(MonitoringError::Configuration(
                "Dependency timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.dependencies.auth_provider_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(MonitoringError::Configuration(format!(
                    "AUTH_PROVIDER_URL must be an http(s) URL, got {}",
                    url
                )));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
