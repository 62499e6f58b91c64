//! Probe targets and probe results
//!
//! This module contains the value types that flow through the pinger:
//!
//! - [`PingDestination`]: identity + URL + HTTP method of one monitored URL
//! - [`PingStatus`]: the outcome of a single probe against a destination
//! - [`Traits`]: serving-technology signature derived from response headers
//! - [`Availability`]: up/down verdict derived from a status
//!
//! Failed probes never produce an error value. They are folded into a
//! [`PingStatus`] carrying one of the negative sentinel codes
//! ([`TIMEOUT_CODE`], [`TRANSPORT_FAILURE_CODE`], [`UNSUPPORTED_METHOD_CODE`]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Status code reported when a probe exceeded its timeout
pub const TIMEOUT_CODE: i32 = -1;

/// Status code reported for DNS, connect, TLS and other transport failures
pub const TRANSPORT_FAILURE_CODE: i32 = -2;

/// Status code reported when the destination names an HTTP method the pinger does not issue
pub const UNSUPPORTED_METHOD_CODE: i32 = -3;

/// Resource type id of inventory resources that describe a monitored URL
pub const URL_RESOURCE_TYPE: &str = "URL";

/// Default HTTP method when a URL resource does not specify one
pub const DEFAULT_HTTP_METHOD: &str = "GET";

/// One URL to probe, identified by the inventory resource it came from
///
/// Two destinations are the same probe target iff all five fields match.
#[derive(
    Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub struct PingDestination {
    /// Tenant owning the resource
    pub tenant_id: String,
    /// Environment the resource lives in
    pub environment_id: String,
    /// Inventory resource id
    pub resource_id: String,
    /// URL to probe
    pub url: String,
    /// HTTP method to use (GET, HEAD or POST)
    #[serde(default = "default_http_method")]
    pub http_method: String,
}

impl PingDestination {
    /// Create a new destination
    pub fn new(
        tenant_id: impl Into<String>,
        environment_id: impl Into<String>,
        resource_id: impl Into<String>,
        url: impl Into<String>,
        http_method: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            environment_id: environment_id.into(),
            resource_id: resource_id.into(),
            url: url.into(),
            http_method: http_method.into(),
        }
    }
}

impl fmt::Display for PingDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}",
            self.tenant_id, self.resource_id, self.http_method, self.url
        )
    }
}

fn default_http_method() -> String {
    DEFAULT_HTTP_METHOD.to_string()
}

/// Serving-technology metadata extracted from HTTP response headers
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Traits {
    /// Comma-separated signature built from `Server` and `X-Powered-By`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powered_by: Option<String>,
}

impl Traits {
    /// Traits with no information
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.powered_by.is_none()
    }
}

/// Up/down verdict for availability reporting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    /// Destination answered with an informational, success or redirect status
    Up,
    /// Destination failed, timed out or answered with a 4xx/5xx status
    Down,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Up => f.write_str("up"),
            Availability::Down => f.write_str("down"),
        }
    }
}

/// Result of one probe
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PingStatus {
    /// The probed destination
    pub destination: PingDestination,
    /// HTTP status code, or a negative sentinel for failures
    pub code: i32,
    /// Wall-clock duration of the round trip in milliseconds
    pub duration_millis: u64,
    /// Whether the probe was abandoned because it exceeded its timeout
    pub timed_out: bool,
    /// Traits extracted from the response headers
    #[serde(default)]
    pub traits: Traits,
    /// Milliseconds since the Unix epoch at which the probe started
    pub timestamp: u64,
}

impl PingStatus {
    /// Status for a destination that answered
    pub fn response(
        destination: PingDestination,
        code: u16,
        duration: Duration,
        timestamp: u64,
        traits: Traits,
    ) -> Self {
        Self {
            destination,
            code: i32::from(code),
            duration_millis: duration_millis(duration),
            timed_out: false,
            traits,
            timestamp,
        }
    }

    /// Status for a probe that exceeded its timeout
    pub fn timeout(destination: PingDestination, duration: Duration, timestamp: u64) -> Self {
        Self::failure(destination, TIMEOUT_CODE, true, duration, timestamp)
    }

    /// Status for a probe that failed below HTTP (DNS, connect, TLS, protocol)
    pub fn transport_failure(
        destination: PingDestination,
        duration: Duration,
        timestamp: u64,
    ) -> Self {
        Self::failure(destination, TRANSPORT_FAILURE_CODE, false, duration, timestamp)
    }

    /// Status for a destination whose HTTP method cannot be issued
    pub fn unsupported_method(
        destination: PingDestination,
        duration: Duration,
        timestamp: u64,
    ) -> Self {
        Self::failure(destination, UNSUPPORTED_METHOD_CODE, false, duration, timestamp)
    }

    fn failure(
        destination: PingDestination,
        code: i32,
        timed_out: bool,
        duration: Duration,
        timestamp: u64,
    ) -> Self {
        Self {
            destination,
            code,
            duration_millis: duration_millis(duration),
            timed_out,
            traits: Traits::empty(),
            timestamp,
        }
    }

    /// Whether the probe got no HTTP response at all
    pub fn is_failure(&self) -> bool {
        self.code < 0
    }

    /// Up iff the destination answered in time with a status below 400
    pub fn availability(&self) -> Availability {
        if !self.timed_out && (100..400).contains(&self.code) {
            Availability::Up
        } else {
            Availability::Down
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or(0)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
