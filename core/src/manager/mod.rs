//! Ping manager implementation
//!
//! This module provides the periodic coordinator that owns the working set of
//! destinations and drives the probe/publish cycle.
//!
//! ## Architecture
//!
//! The manager runs as a single tokio task. Each timer tick (or on-demand
//! trigger) runs one cycle through the states:
//!
//! ```text
//! Idle → Merging → Dispatching → Awaiting → Publishing → Idle
//! ```
//!
//! Cycles never overlap, so a destination is never probed twice at once.
//! Within a cycle, probes run as separate tasks bounded by a semaphore.
//!
//! ## Components
//!
//! - [`ManagerHandle`]: Control interface for a running manager
//! - [`ControlMsg`]: Messages accepted by the manager task
//! - [`PingManager`]: The task state and cycle logic
//! - [`CycleReport`]: Outcome of one cycle

use crate::collector::UrlChangesCollector;
use crate::ping::Pinger;
use crate::sinks::{MetricsSink, TraitsSink};
use crate::Result;
use schema::{InventoryEvent, ManagerEvent, PingDestination, PingStatus, PingerConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

pub mod manager_task;


pub use manager_task::*;

/// Control messages for manager operations
#[derive(Debug)]
pub enum ControlMsg {
    /// Run a cycle immediately
    TriggerCycle {
        /// Response channel for the cycle report
        response: oneshot::Sender<CycleReport>,
    },
    /// Snapshot the working set
    GetDestinations {
        /// Response channel for the destinations
        response: oneshot::Sender<Vec<PingDestination>>,
    },
    /// Stop the manager task
    Shutdown,
}

/// Phase of the probe/publish cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleState {
    /// Waiting for the next tick
    Idle,
    /// Draining the collector into the working set
    Merging,
    /// Spawning one probe per destination
    Dispatching,
    /// Waiting for probes to finish or the cycle deadline
    Awaiting,
    /// Handing statuses to the sinks
    Publishing,
}

/// Outcome of one probe/publish cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Cycle sequence number, starting at 1
    pub cycle: u64,
    /// Working-set size at dispatch time
    pub destinations: usize,
    /// Probes that got an HTTP response
    pub succeeded: usize,
    /// Probes that failed below HTTP or had an unsupported method
    pub failed: usize,
    /// Probes that timed out or were cut off by the cycle deadline
    pub timed_out: usize,
    /// Destinations not probed this cycle: a probe was still in flight, or
    /// the cycle deadline passed before it got a ping slot
    pub skipped: usize,
    /// Whether the cycle deadline cut off outstanding probes
    pub deadline_exceeded: bool,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
    /// Every status published in this cycle
    pub statuses: Vec<PingStatus>,
}

/// Timing and concurrency settings of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between cycle starts
    pub interval: Duration,
    /// Maximum number of probes in flight at once
    pub max_concurrent_pings: usize,
    /// Upper bound on dispatch + await of one cycle
    pub cycle_deadline: Duration,
    /// Upper bound on handing one status to one sink
    pub publish_timeout: Duration,
}

impl From<&PingerConfig> for Schedule {
    fn from(config: &PingerConfig) -> Self {
        Self {
            interval: config.interval(),
            max_concurrent_pings: config.max_concurrent_pings,
            cycle_deadline: config.cycle_deadline(),
            publish_timeout: config.publish_timeout(),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from(&PingerConfig::default())
    }
}

/// Configuration for spawning a manager
pub struct ManagerConfig {
    /// Timing and concurrency settings
    pub schedule: Schedule,
    /// Probe implementation
    pub pinger: Arc<dyn Pinger>,
    /// Metrics/availability sink
    pub metrics_sink: Arc<dyn MetricsSink>,
    /// Traits sink
    pub traits_sink: Arc<dyn TraitsSink>,
    /// Buffer of pending destination changes
    pub collector: Arc<UrlChangesCollector>,
    /// Broadcaster for manager events
    pub event_tx: broadcast::Sender<ManagerEvent>,
}

/// Handle for controlling a manager instance
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    state_rx: watch::Receiver<CycleState>,
    event_tx: broadcast::Sender<ManagerEvent>,
    collector: Arc<UrlChangesCollector>,
}

impl ManagerHandle {
    /// Send a control message to the manager
    pub fn send(&self, msg: ControlMsg) -> Result<()> {
        self.control_tx.send(msg).map_err(|_| {
            crate::CoreError::ManagerError("Manager task has shut down".to_string())
        })?;
        Ok(())
    }

    /// Run a cycle now and wait for its report
    ///
    /// The cycle is queued behind any cycle already running.
    pub async fn trigger_cycle(&self) -> Result<CycleReport> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ControlMsg::TriggerCycle {
            response: response_tx,
        })?;
        response_rx.await.map_err(|_| {
            crate::CoreError::ManagerError("Failed to get cycle report".to_string())
        })
    }

    /// Snapshot of the working set, sorted
    pub async fn destinations(&self) -> Result<Vec<PingDestination>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ControlMsg::GetDestinations {
            response: response_tx,
        })?;
        response_rx.await.map_err(|_| {
            crate::CoreError::ManagerError("Failed to get destinations".to_string())
        })
    }

    /// Record an inventory event for the next merge
    pub fn record(&self, event: &InventoryEvent) -> bool {
        self.collector.record(event)
    }

    /// The collector feeding this manager
    pub fn collector(&self) -> Arc<UrlChangesCollector> {
        self.collector.clone()
    }

    /// Current cycle phase
    pub fn current_state(&self) -> CycleState {
        *self.state_rx.borrow()
    }

    /// Subscribe to cycle phase changes
    pub fn subscribe_to_state(&self) -> watch::Receiver<CycleState> {
        self.state_rx.clone()
    }

    /// Subscribe to manager events
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the manager after the current cycle
    pub fn shutdown(&self) -> Result<()> {
        self.send(ControlMsg::Shutdown)
    }

    /// Wait until the manager task has terminated
    pub async fn closed(&self) {
        self.control_tx.closed().await
    }
}

/// Spawn a manager task
///
/// The first cycle starts immediately, then one every `schedule.interval`.
/// A [`ManagerHandle::trigger_cycle`] sent while a cycle runs waits for it.
pub fn spawn_manager(config: ManagerConfig) -> ManagerHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let event_tx = config.event_tx.clone();
    let collector = config.collector.clone();

    let mut manager = PingManager::new(config);
    let state_rx = manager.subscribe_to_state();

    info!("Spawning ping manager");
    tokio::spawn(async move {
        if let Err(e) = manager.run(control_rx).await {
            error!("Ping manager task failed: {}", e);
        }
        info!("Ping manager task terminated");
    });

    ManagerHandle {
        control_tx,
        state_rx,
        event_tx,
        collector,
    }
}
