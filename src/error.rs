use thiserror::Error;

/// Main error type for the warden supervisor
#[derive(Debug, Error)]
pub enum WardenError {
    // Service-related errors
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn service: {0}")]
    SpawnFailure(String),

    #[error("Service {0} did not exit within its grace period and was killed")]
    TerminationTimeout(String),

    #[error("Health probe failed: {0}")]
    ProbeFailure(String),

    // Registry persistence errors
    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    // Host metrics errors
    #[error("Metrics unavailable for subsystem: {0}")]
    MetricsUnavailable(String),

    // System errors
    #[error("Signal error: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for warden operations
pub type Result<T> = std::result::Result<T, WardenError>;
