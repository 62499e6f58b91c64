//! Simple daemon error types

use pinger_core::CoreError;

#[derive(Debug)]
pub enum DaemonError {
    ConfigError(String),
    StartupError(String),
    Core(CoreError),
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            DaemonError::StartupError(msg) => write!(f, "Startup error: {}", msg),
            DaemonError::Core(err) => write!(f, "{} ({})", err, err.code()),
            DaemonError::IoError(err) => write!(f, "I/O error: {}", err),
            DaemonError::SerializationError(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaemonError::Core(err) => Some(err),
            DaemonError::IoError(err) => Some(err),
            DaemonError::SerializationError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoreError> for DaemonError {
    fn from(err: CoreError) -> Self {
        DaemonError::Core(err)
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::IoError(err)
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::SerializationError(err)
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
