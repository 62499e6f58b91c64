//! Error types for probe operations
//!
//! These never escape a [`Pinger`](super::Pinger): every variant is folded into
//! a [`PingStatus`] carrying the matching sentinel code.

use schema::{PingDestination, PingStatus};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while probing a destination
#[derive(Error, Debug)]
pub enum PingError {
    /// The probe did not complete within its timeout
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// DNS, connect, TLS or protocol failure
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The destination names a method other than GET, HEAD or POST
    #[error("unsupported http method: {0}")]
    UnsupportedMethod(String),

    /// The destination URL cannot be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl PingError {
    /// Fold this error into the status reported for `destination`
    pub fn into_status(
        self,
        destination: PingDestination,
        duration: Duration,
        timestamp: u64,
    ) -> PingStatus {
        match self {
            PingError::Timeout(_) => PingStatus::timeout(destination, duration, timestamp),
            PingError::UnsupportedMethod(_) => {
                PingStatus::unsupported_method(destination, duration, timestamp)
            }
            PingError::Transport(_) | PingError::InvalidUrl(_) => {
                PingStatus::transport_failure(destination, duration, timestamp)
            }
        }
    }
}
