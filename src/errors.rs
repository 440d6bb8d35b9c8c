use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("INVALID_ID: {0}")]
    InvalidId(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("VALIDATION_FAILED: {message}")]
    ValidationFailed {
        message: String,
        suggestion: Option<String>,
    },
    #[error("CONFLICT_DETECTED: {0}")]
    ConflictDetected(String),
    #[error("INTEGRITY_VIOLATION: {0}")]
    IntegrityViolation(String),
    #[error("NOT_INITIALIZED: {0}")]
    NotInitialized(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Missing files are recoverable for graph walks and child checks.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ValidationFailed { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
