//! Outbound publish interfaces and implementations
//!
//! Every completed [`PingStatus`] is handed to two independent sinks:
//!
//! - [`MetricsSink`]: records status code, duration and availability keyed
//!   by tenant + resource
//! - [`TraitsSink`]: records the extracted traits keyed by tenant + resource
//!
//! The manager publishes to both concurrently and isolates their failures,
//! so an implementation may fail freely. A call that outlives the publish
//! timeout is abandoned and reported as a failure. Implementations must be
//! thread-safe.
//!
//! Two implementations live here: [`TracingSink`], which logs every status,
//! and [`RecordingSink`], which records calls for verification and can be
//! told to fail.

use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{Availability, PingStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Sink for availability and response-time data points
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Publish the code, duration and availability of one status
    async fn publish_metrics(&self, status: &PingStatus) -> Result<()>;
}

/// Sink for serving-technology traits
#[async_trait]
pub trait TraitsSink: Send + Sync {
    /// Publish the traits of one status
    async fn publish_traits(&self, status: &PingStatus) -> Result<()>;
}

/// Sink that writes every status to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl MetricsSink for TracingSink {
    async fn publish_metrics(&self, status: &PingStatus) -> Result<()> {
        let destination = &status.destination;
        info!(
            tenant_id = %destination.tenant_id,
            resource_id = %destination.resource_id,
            url = %destination.url,
            code = status.code,
            duration_ms = status.duration_millis,
            timed_out = status.timed_out,
            availability = %status.availability(),
            "ping result"
        );
        Ok(())
    }
}

#[async_trait]
impl TraitsSink for TracingSink {
    async fn publish_traits(&self, status: &PingStatus) -> Result<()> {
        let destination = &status.destination;
        match &status.traits.powered_by {
            Some(powered_by) => info!(
                tenant_id = %destination.tenant_id,
                resource_id = %destination.resource_id,
                powered_by = %powered_by,
                "ping traits"
            ),
            None => debug!(
                "No traits for {}/{}",
                destination.tenant_id, destination.resource_id
            ),
        }
        Ok(())
    }
}

/// Log entry for recording publish calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishLog {
    /// A metrics publish was called
    Metrics {
        /// Tenant of the destination
        tenant_id: String,
        /// Resource of the destination
        resource_id: String,
        /// Reported status code
        code: i32,
        /// Reported duration
        duration_millis: u64,
        /// Derived availability
        availability: Availability,
    },
    /// A traits publish was called
    Traits {
        /// Tenant of the destination
        tenant_id: String,
        /// Resource of the destination
        resource_id: String,
        /// Reported powered-by signature
        powered_by: Option<String>,
    },
}

/// A sink that records calls for testing
///
/// Implements both sink traits. Either side can be switched to fail, in which
/// case the call is still recorded before the error is returned.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<PublishLog>>,
    fail_metrics: AtomicBool,
    fail_traits: AtomicBool,
}

impl RecordingSink {
    /// Create a new RecordingSink instance
    pub fn new() -> Self {
        Self::default()
    }

    fn calls_lock(&self) -> MutexGuard<'_, Vec<PublishLog>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent metrics publishes fail (or succeed again)
    pub fn set_fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent traits publishes fail (or succeed again)
    pub fn set_fail_traits(&self, fail: bool) {
        self.fail_traits.store(fail, Ordering::SeqCst);
    }

    /// Get a copy of all recorded calls
    pub fn get_calls(&self) -> Vec<PublishLog> {
        self.calls_lock().clone()
    }

    /// Get the count of recorded calls
    pub fn call_count(&self) -> usize {
        self.calls_lock().len()
    }

    /// Recorded metrics publishes
    pub fn metrics_calls(&self) -> Vec<PublishLog> {
        self.get_calls()
            .into_iter()
            .filter(|call| matches!(call, PublishLog::Metrics { .. }))
            .collect()
    }

    /// Recorded traits publishes
    pub fn traits_calls(&self) -> Vec<PublishLog> {
        self.get_calls()
            .into_iter()
            .filter(|call| matches!(call, PublishLog::Traits { .. }))
            .collect()
    }

    /// Clear all recorded calls
    pub fn reset(&self) {
        self.calls_lock().clear();
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn publish_metrics(&self, status: &PingStatus) -> Result<()> {
        self.calls_lock().push(PublishLog::Metrics {
            tenant_id: status.destination.tenant_id.clone(),
            resource_id: status.destination.resource_id.clone(),
            code: status.code,
            duration_millis: status.duration_millis,
            availability: status.availability(),
        });
        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(CoreError::PublishError("metrics sink unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TraitsSink for RecordingSink {
    async fn publish_traits(&self, status: &PingStatus) -> Result<()> {
        self.calls_lock().push(PublishLog::Traits {
            tenant_id: status.destination.tenant_id.clone(),
            resource_id: status.destination.resource_id.clone(),
            powered_by: status.traits.powered_by.clone(),
        });
        if self.fail_traits.load(Ordering::SeqCst) {
            return Err(CoreError::PublishError("traits sink unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{PingDestination, Traits};
    use std::time::Duration;

    fn status(code: u16) -> PingStatus {
        PingStatus::response(
            PingDestination::new("tenant", "test", "res-1", "http://example.com", "GET"),
            code,
            Duration::from_millis(42),
            0,
            Traits {
                powered_by: Some("nginx".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_recording_sink_records_both_sides() {
        let sink = RecordingSink::new();
        sink.publish_metrics(&status(200)).await.unwrap();
        sink.publish_traits(&status(200)).await.unwrap();

        let expected = vec![
            PublishLog::Metrics {
                tenant_id: "tenant".to_string(),
                resource_id: "res-1".to_string(),
                code: 200,
                duration_millis: 42,
                availability: Availability::Up,
            },
            PublishLog::Traits {
                tenant_id: "tenant".to_string(),
                resource_id: "res-1".to_string(),
                powered_by: Some("nginx".to_string()),
            },
        ];
        assert_eq!(sink.get_calls(), expected);
        assert_eq!(sink.metrics_calls().len(), 1);
        assert_eq!(sink.traits_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_is_per_side() {
        let sink = RecordingSink::new();
        sink.set_fail_metrics(true);

        let err = sink.publish_metrics(&status(503)).await.unwrap_err();
        assert_eq!(err.code(), "CORE005");
        assert!(sink.publish_traits(&status(503)).await.is_ok());
        assert_eq!(sink.call_count(), 2);

        sink.set_fail_metrics(false);
        assert!(sink.publish_metrics(&status(503)).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset() {
        let sink = RecordingSink::new();
        sink.publish_metrics(&status(200)).await.unwrap();
        sink.reset();
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingSink;
        assert!(sink.publish_metrics(&status(500)).await.is_ok());
        assert!(sink.publish_traits(&status(500)).await.is_ok());
    }
}
