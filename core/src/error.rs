//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Manager error: {0}")]
    ManagerError(String),

    #[error("Publish error: {0}")]
    PublishError(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ManagerError(_) => "CORE004",
            CoreError::PublishError(_) => "CORE005",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::ConfigurationError("test".to_string()).code(), "CORE001");
        assert_eq!(CoreError::ValidationError("test".to_string()).code(), "CORE002");
        assert_eq!(CoreError::InitializationError("test".to_string()).code(), "CORE003");
        assert_eq!(CoreError::ManagerError("test".to_string()).code(), "CORE004");
        assert_eq!(CoreError::PublishError("test".to_string()).code(), "CORE005");
    }

    #[test]
    fn test_error_display() {
        let error = CoreError::PublishError("metrics endpoint returned 503".to_string());
        assert_eq!(error.to_string(), "Publish error: metrics endpoint returned 503");

        let error = CoreError::ValidationError("intervalSecs: must be > 0".to_string());
        assert_eq!(error.to_string(), "Validation error: intervalSecs: must be > 0");
    }
}
