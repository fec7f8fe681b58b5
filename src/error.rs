use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitoringError {
    #[error("Alert not found: {id}")]
    AlertNotFound { id: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dependency {name} unreachable: {reason}")]
    Dependency { name: String, reason: String },

    #[error("Operation timeout: {message}")]
    Timeout { message: String },
}

pub type Result<T> = std::result::Result<T, MonitoringError>;
