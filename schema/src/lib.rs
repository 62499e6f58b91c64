//! Schema definitions for the pinger
//!
//! This crate contains the data structures shared by the pinger core and the
//! daemon: probe destinations and results, inbound inventory events, outbound
//! manager events and the service configuration. All types here implement
//! JSON Schema generation for external consumption.

pub mod destination;
pub mod events;


pub use destination::*;
pub use events::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the pinger service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PingerConfig {
    /// Seconds between the start of two probe cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Connect+read timeout of a single probe in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of probes in flight at once
    #[serde(default = "default_max_concurrent_pings")]
    pub max_concurrent_pings: usize,

    /// Upper bound on a cycle's dispatch+await phase in seconds
    #[serde(default = "default_cycle_deadline_secs")]
    pub cycle_deadline_secs: u64,

    /// Upper bound on handing one status to one sink in seconds
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// User-Agent header sent with every probe
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Log level for the service
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Destinations monitored from startup, before any inventory event
    #[serde(default)]
    pub destinations: Vec<PingDestination>,
}

impl PingerConfig {
    /// Get the cycle interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Get the probe timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the cycle deadline as a Duration
    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    /// Get the per-sink publish timeout as a Duration
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

impl Default for PingerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_pings: default_max_concurrent_pings(),
            cycle_deadline_secs: default_cycle_deadline_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            user_agent: default_user_agent(),
            log_level: default_log_level(),
            destinations: Vec::new(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    20
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_concurrent_pings() -> usize {
    16
}

const fn default_cycle_deadline_secs() -> u64 {
    15
}

const fn default_publish_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("pinger/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
