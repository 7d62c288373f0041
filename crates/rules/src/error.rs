//! Error type shared across the rules crate.

use vigil_core::VigilError;

/// Errors raised while loading, resolving, aggregating, or scheduling rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// JSON parse/deserialization error (catalog snapshots, events).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rule validation error (e.g. missing required fields, wrong kind).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Cron expression could not be parsed or has no upcoming fire time.
    #[error("invalid cron expression '{expression}': {reason}")]
    Cron { expression: String, reason: String },

    /// Rule store or finding provider failure.
    #[error("Store error: {0}")]
    Store(String),

    /// No Tokio runtime available for the scheduler.
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Core(#[from] VigilError),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
