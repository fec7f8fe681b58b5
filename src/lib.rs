pub mod api;
pub mod application;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitoring;

pub use config::Config;
pub use error::{MonitoringError, Result};

// Re-export the monitoring core
pub use monitoring::{
    AlertManager, AlertRule, AlertSeverity, AlertType, HealthMonitor, HealthStatus,
    MetricsCollector, MetricsSnapshot,
};
