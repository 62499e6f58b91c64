//! Event types crossing the pinger's boundaries
//!
//! - [`InventoryEvent`]: inbound resource create/delete notifications. Only
//!   resources of type [`URL_RESOURCE_TYPE`] become ping destinations.
//! - [`ManagerEvent`]: outbound observability events broadcast by the ping
//!   manager (cycle summaries, publish failures, working-set changes).
//!
//! Both are serializable so they can be read from or written to NDJSON.

use crate::destination::{PingDestination, DEFAULT_HTTP_METHOD, URL_RESOURCE_TYPE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Kind of inventory change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum InventoryAction {
    /// Resource was created
    Created,
    /// Resource was deleted
    Deleted,
}

/// Inventory resource carried by an [`InventoryEvent`]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResource {
    /// Resource id
    pub id: String,
    /// Resource type id, `"URL"` for monitored URLs
    pub resource_type: String,
    /// Resource properties; URL resources carry `url` and optionally `method`
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// A resource create/delete notification from the inventory
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEvent {
    /// Whether the resource was created or deleted
    pub action: InventoryAction,
    /// Tenant owning the resource
    pub tenant_id: String,
    /// Environment the resource lives in
    pub environment_id: String,
    /// The resource itself
    pub resource: InventoryResource,
}

impl InventoryEvent {
    /// Build a URL-resource event
    pub fn url_resource(
        action: InventoryAction,
        tenant_id: impl Into<String>,
        environment_id: impl Into<String>,
        resource_id: impl Into<String>,
        url: impl Into<String>,
        method: Option<&str>,
    ) -> Self {
        let mut properties = HashMap::new();
        properties.insert("url".to_string(), serde_json::Value::String(url.into()));
        if let Some(method) = method {
            properties.insert(
                "method".to_string(),
                serde_json::Value::String(method.to_string()),
            );
        }
        Self {
            action,
            tenant_id: tenant_id.into(),
            environment_id: environment_id.into(),
            resource: InventoryResource {
                id: resource_id.into(),
                resource_type: URL_RESOURCE_TYPE.to_string(),
                properties,
            },
        }
    }

    /// Whether the event concerns a monitored URL resource
    pub fn is_url_resource(&self) -> bool {
        self.resource.resource_type == URL_RESOURCE_TYPE
    }

    /// The destination this event describes, if it is a usable URL resource
    ///
    /// Returns `None` for non-URL resources and for URL resources without a
    /// non-blank `url` property. A missing `method` defaults to `GET`.
    pub fn destination(&self) -> Option<PingDestination> {
        if !self.is_url_resource() {
            return None;
        }
        let url = self.string_property("url")?;
        let method = self
            .string_property("method")
            .unwrap_or(DEFAULT_HTTP_METHOD);
        Some(PingDestination::new(
            self.tenant_id.clone(),
            self.environment_id.clone(),
            self.resource.id.clone(),
            url,
            method,
        ))
    }

    fn string_property(&self, key: &str) -> Option<&str> {
        self.resource
            .properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Which outbound sink a publish went to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SinkKind {
    /// Metrics/availability sink
    Metrics,
    /// Traits sink
    Traits,
}

/// Events broadcast by the ping manager
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum ManagerEvent {
    /// A destination entered the working set
    DestinationAdded {
        /// The destination
        destination: PingDestination,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A destination left the working set
    DestinationRemoved {
        /// The destination
        destination: PingDestination,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A probe/publish cycle finished
    CycleCompleted {
        /// Cycle sequence number, starting at 1
        cycle: u64,
        /// Working-set size at dispatch time
        destinations: usize,
        /// Probes that got an HTTP response
        succeeded: usize,
        /// Probes that failed below HTTP or had an unsupported method
        failed: usize,
        /// Probes that timed out or hit the cycle deadline
        timed_out: usize,
        /// Destinations skipped because a probe was still in flight
        skipped: usize,
        /// Wall-clock duration of the whole cycle
        duration_ms: u64,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Publishing a status to one sink failed
    PublishFailed {
        /// Sink that rejected the status
        sink: SinkKind,
        /// Tenant of the destination
        tenant_id: String,
        /// Resource of the destination
        resource_id: String,
        /// Error message
        error: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },
}

impl ManagerEvent {
    /// Get the timestamp for this event
    #[must_use]
    pub fn timestamp(&self) -> &str {
        match self {
            Self::DestinationAdded { timestamp, .. }
            | Self::DestinationRemoved { timestamp, .. }
            | Self::CycleCompleted { timestamp, .. }
            | Self::PublishFailed { timestamp, .. } => timestamp,
        }
    }

    /// Create a current timestamp string in RFC3339 format
    #[must_use]
    pub fn current_timestamp() -> String {
        humantime::format_rfc3339_millis(SystemTime::now()).to_string()
    }
}
