use thiserror::Error;

/// Everything the trajectory core can fail with.
///
/// The pipeline boundary ([`crate::pipeline`]) turns these into structured
/// `{error, message}` payloads; nothing below that boundary swallows them.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("cannot decode input as {encoding}: {message}")]
    Decode { encoding: String, message: String },

    #[error("malformed tabular data: {0}")]
    Parse(String),

    #[error("could not resolve position columns (found {found:?} among {columns:?})")]
    UnresolvableColumns {
        found: Vec<String>,
        columns: Vec<String>,
    },

    #[error("cleaning operation '{operation}' failed: {message}")]
    CleaningOperation { operation: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl TrajectoryError {
    /// Short machine-readable category used as the `error` field of payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TrajectoryError::Decode { .. } => "Decode error",
            TrajectoryError::Parse(_) | TrajectoryError::Csv(_) => "Parse error",
            TrajectoryError::UnresolvableColumns { .. } => "Missing required position columns",
            TrajectoryError::CleaningOperation { .. } => "Cleaning error",
            TrajectoryError::Io(_) => "I/O error",
            TrajectoryError::Config(_) => "Configuration error",
        }
    }
}

pub type Result<T> = std::result::Result<T, TrajectoryError>;
