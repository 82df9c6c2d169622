use thiserror::Error;

/// Failures a caller is expected to branch on. Carried inside
/// `anyhow::Error` and recovered with `downcast_ref` at the command layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("no acting user; pass --as <username> or set WORKTHREAD_USER")]
    Unauthenticated,
}

impl AppError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Validation { .. } => 2,
            AppError::Unauthenticated => 3,
            AppError::Forbidden(_) => 4,
            AppError::NotFound(_) => 5,
            AppError::Conflict(_) => 6,
        }
    }
}
