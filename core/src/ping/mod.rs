//! Probing functionality
//!
//! This module provides the HTTP probe used by the ping manager. A probe
//! never fails from the caller's point of view: it always produces a
//! [`schema::PingStatus`], with timeouts and transport failures encoded as
//! sentinel codes.
//!
//! ## Types
//!
//! - [`Pinger`]: The trait the manager drives; swap in test doubles here
//! - [`HttpPinger`]: reqwest-based GET/HEAD/POST probe with timeout and TLS
//! - [`HttpMethod`]: The methods a probe may issue
//! - [`PingError`]: Internal failure taxonomy folded into statuses

pub mod error;
pub mod http;
pub mod types;

pub use error::PingError;
pub use http::{HttpPinger, DEFAULT_USER_AGENT, MAX_REDIRECTS};
pub use types::{HttpMethod, Pinger};

use schema::PingerConfig;
use std::sync::Arc;

/// Create the production pinger for a configuration
pub fn create_pinger(config: &PingerConfig) -> Result<Arc<dyn Pinger>, PingError> {
    let pinger = HttpPinger::from_config(config)?;
    Ok(Arc::new(pinger))
}
