use thiserror::Error;

#[derive(Error, Debug)]
pub enum VitalsError {
    #[error("Invalid metric definition: {0}")]
    InvalidDefinition(String),

    #[error("Metric '{0}' is already registered with a different kind or label set")]
    DuplicateName(String),

    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    #[error("Metric not registered: {0}")]
    NotRegistered(String),

    #[error("Metric '{name}' is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VitalsError>;
