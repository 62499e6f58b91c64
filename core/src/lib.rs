//! Core functionality for the URL pinger
//!
//! This crate contains the probing, change tracking and scheduling logic
//! used by the daemon:
//!
//! - [`traits`]: serving-technology extraction from response headers
//! - [`ping`]: the [`Pinger`] trait and its reqwest-based implementation
//! - [`collector`]: buffered add/remove tracking of destinations
//! - [`manager`]: the periodic probe/publish coordinator
//! - [`sinks`]: outbound publish interfaces
//! - [`inventory`]: inventory event intake
//! - [`config`]: TOML configuration loading and validation

pub mod collector;
pub mod config;
pub mod error;
pub mod inventory;
pub mod manager;
pub mod ping;
pub mod sinks;
pub mod traits;

// Re-export schema types for convenience
pub use schema::*;

pub use collector::{AppliedChanges, PendingCounts, UrlChangesCollector};
pub use error::{CoreError, Result};
pub use manager::{
    spawn_manager, CycleReport, CycleState, ManagerConfig, ManagerHandle, PingManager, Schedule,
};
pub use ping::{create_pinger, HttpMethod, HttpPinger, PingError, Pinger};
pub use sinks::{MetricsSink, PublishLog, RecordingSink, TracingSink, TraitsSink};
pub use traits::extract_traits;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    ///
    /// `RUST_LOG` takes precedence over `level` when set.
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
