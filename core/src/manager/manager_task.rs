//! Ping manager task implementation
//!
//! This module contains the [`PingManager`] which owns the working set and
//! implements the probe/publish cycle.

use super::{ControlMsg, CycleReport, CycleState, ManagerConfig, Schedule};
use crate::collector::UrlChangesCollector;
use crate::ping::Pinger;
use crate::sinks::{MetricsSink, TraitsSink};
use crate::{CoreError, Result};
use schema::{epoch_millis, ManagerEvent, PingDestination, PingStatus, SinkKind};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout, timeout_at, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// `tokio::time::interval` panics on a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

type DestinationSet = Arc<Mutex<HashSet<PingDestination>>>;

fn lock_set(set: &DestinationSet) -> MutexGuard<'_, HashSet<PingDestination>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a destination as probed until dropped
///
/// Dropping happens when the probe task finishes or is aborted.
struct InFlightGuard {
    in_flight: DestinationSet,
    destination: PingDestination,
}

impl InFlightGuard {
    /// Mark `destination` as in flight, or `None` if it already is
    fn acquire(in_flight: &DestinationSet, destination: &PingDestination) -> Option<Self> {
        if !lock_set(in_flight).insert(destination.clone()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            destination: destination.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_set(&self.in_flight).remove(&self.destination);
    }
}

/// Periodic coordinator owning the working set of destinations
pub struct PingManager {
    /// Timing and concurrency settings
    schedule: Schedule,
    /// Probe implementation
    pinger: Arc<dyn Pinger>,
    /// Metrics/availability sink
    metrics_sink: Arc<dyn MetricsSink>,
    /// Traits sink
    traits_sink: Arc<dyn TraitsSink>,
    /// Buffer of pending destination changes
    collector: Arc<UrlChangesCollector>,
    /// Event broadcaster
    event_tx: broadcast::Sender<ManagerEvent>,
    /// Cycle phase broadcaster
    state_tx: watch::Sender<CycleState>,
    /// Destinations probed each cycle
    working_set: HashSet<PingDestination>,
    /// Destinations with a probe task alive
    in_flight: DestinationSet,
    /// Bounds the number of concurrent probes
    permits: Arc<Semaphore>,
    /// Number of cycles started so far
    cycle: u64,
}

impl PingManager {
    /// Create a new manager with an empty working set
    pub fn new(config: ManagerConfig) -> Self {
        let ManagerConfig {
            mut schedule,
            pinger,
            metrics_sink,
            traits_sink,
            collector,
            event_tx,
        } = config;

        schedule.interval = schedule.interval.max(MIN_INTERVAL);
        schedule.max_concurrent_pings = schedule.max_concurrent_pings.max(1);
        let (state_tx, _state_rx) = watch::channel(CycleState::Idle);

        Self {
            permits: Arc::new(Semaphore::new(schedule.max_concurrent_pings)),
            schedule,
            pinger,
            metrics_sink,
            traits_sink,
            collector,
            event_tx,
            state_tx,
            working_set: HashSet::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            cycle: 0,
        }
    }

    /// The destinations currently probed each cycle
    pub fn working_set(&self) -> &HashSet<PingDestination> {
        &self.working_set
    }

    /// Number of destinations with a probe task still alive
    pub fn in_flight(&self) -> usize {
        lock_set(&self.in_flight).len()
    }

    /// Subscribe to cycle phase changes
    pub fn subscribe_to_state(&self) -> watch::Receiver<CycleState> {
        self.state_tx.subscribe()
    }

    /// Run the manager task loop until shutdown
    pub async fn run(&mut self, mut control_rx: mpsc::UnboundedReceiver<ControlMsg>) -> Result<()> {
        info!(
            "Starting ping manager (interval {:?}, at most {} concurrent pings, cycle deadline {:?}, publish timeout {:?})",
            self.schedule.interval,
            self.schedule.max_concurrent_pings,
            self.schedule.cycle_deadline,
            self.schedule.publish_timeout
        );
        // The first cycle runs right away; a trigger sent meanwhile queues behind it
        let mut tick = interval_at(tokio::time::Instant::now(), self.schedule.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = control_rx.recv() => {
                    match msg {
                        Some(ControlMsg::Shutdown) => {
                            info!("Shutdown requested for ping manager");
                            break;
                        }
                        Some(msg) => {
                            debug!("Received control message: {:?}", msg);
                            self.handle_control_message(msg).await?;
                        }
                        None => {
                            info!("Control channel closed, shutting down ping manager");
                            break;
                        }
                    }
                }

                _ = tick.tick() => {
                    let report = self.run_cycle().await;
                    let elapsed = Duration::from_millis(report.duration_ms);
                    if elapsed > self.schedule.interval {
                        warn!(
                            "Cycle {} took {:?}, longer than the {:?} interval; skipping missed ticks",
                            report.cycle, elapsed, self.schedule.interval
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a control message
    async fn handle_control_message(&mut self, msg: ControlMsg) -> Result<()> {
        match msg {
            ControlMsg::TriggerCycle { response } => {
                let report = self.run_cycle().await;
                let _ = response.send(report);
            }
            ControlMsg::GetDestinations { response } => {
                let mut destinations: Vec<_> = self.working_set.iter().cloned().collect();
                destinations.sort();
                let _ = response.send(destinations);
            }
            ControlMsg::Shutdown => {
                return Err(CoreError::ManagerError(
                    "Shutdown must be handled by the run loop".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Run one full cycle: merge, dispatch, await, publish
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let cycle = self.cycle;
        let started = Instant::now();
        let started_at = epoch_millis(SystemTime::now());
        debug!("Starting cycle {}", cycle);

        self.set_state(CycleState::Merging);
        self.merge();

        self.set_state(CycleState::Dispatching);
        let destinations = self.working_set.len();
        let mut probes = JoinSet::new();
        let mut outstanding = HashSet::with_capacity(destinations);
        let pinged: DestinationSet = Arc::default();
        let mut skipped = 0;

        for destination in &self.working_set {
            let Some(guard) = InFlightGuard::acquire(&self.in_flight, destination) else {
                warn!("Skipping {}: previous probe still in flight", destination);
                skipped += 1;
                continue;
            };
            outstanding.insert(destination.clone());

            let pinger = self.pinger.clone();
            let permits = self.permits.clone();
            let pinged = pinged.clone();
            let destination = destination.clone();
            probes.spawn(async move {
                let _guard = guard;
                // The semaphore is never closed, so this always holds a permit
                let _permit = permits.acquire_owned().await;
                lock_set(&pinged).insert(destination.clone());
                pinger.ping(&destination).await
            });
        }

        self.set_state(CycleState::Awaiting);
        let deadline = tokio::time::Instant::now() + self.schedule.cycle_deadline;
        let mut statuses = Vec::with_capacity(outstanding.len());
        let mut deadline_exceeded = false;

        loop {
            match timeout_at(deadline, probes.join_next()).await {
                Ok(Some(Ok(status))) => {
                    outstanding.remove(&status.destination);
                    statuses.push(status);
                }
                Ok(Some(Err(e))) => {
                    error!("Probe task failed in cycle {}: {}", cycle, e);
                }
                Ok(None) => break,
                Err(_elapsed) => {
                    deadline_exceeded = true;
                    break;
                }
            }
        }

        if deadline_exceeded {
            warn!(
                "Cycle {} reached its {:?} deadline with {} probes outstanding; abandoning them",
                cycle,
                self.schedule.cycle_deadline,
                outstanding.len()
            );
            probes.abort_all();
            // Drain so every in-flight guard is released before the next cycle
            while let Some(result) = probes.join_next().await {
                if let Ok(status) = result {
                    outstanding.remove(&status.destination);
                    statuses.push(status);
                }
            }
        }

        let elapsed = started.elapsed();
        let pinged = std::mem::take(&mut *lock_set(&pinged));
        for destination in outstanding {
            if !deadline_exceeded {
                statuses.push(PingStatus::transport_failure(destination, elapsed, started_at));
            } else if pinged.contains(&destination) {
                statuses.push(PingStatus::timeout(destination, elapsed, started_at));
            } else {
                debug!("Skipping {}: still waiting for a ping slot at the deadline", destination);
                skipped += 1;
            }
        }
        statuses.sort_by(|a, b| a.destination.cmp(&b.destination));

        self.set_state(CycleState::Publishing);
        for status in &statuses {
            self.publish(status).await;
        }

        let timed_out = statuses.iter().filter(|s| s.timed_out).count();
        let failed = statuses
            .iter()
            .filter(|s| s.is_failure() && !s.timed_out)
            .count();
        let report = CycleReport {
            cycle,
            destinations,
            succeeded: statuses.len() - timed_out - failed,
            failed,
            timed_out,
            skipped,
            deadline_exceeded,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            statuses,
        };

        info!(
            "Cycle {} probed {} destinations: {} answered, {} failed, {} timed out, {} skipped in {} ms",
            cycle,
            report.destinations,
            report.succeeded,
            report.failed,
            report.timed_out,
            report.skipped,
            report.duration_ms
        );
        self.emit_event(ManagerEvent::CycleCompleted {
            cycle,
            destinations: report.destinations,
            succeeded: report.succeeded,
            failed: report.failed,
            timed_out: report.timed_out,
            skipped: report.skipped,
            duration_ms: report.duration_ms,
            timestamp: ManagerEvent::current_timestamp(),
        });
        self.set_state(CycleState::Idle);

        report
    }

    /// Drain pending changes into the working set
    fn merge(&mut self) {
        let applied = self.collector.apply(&mut self.working_set);
        if applied.is_empty() {
            return;
        }

        for destination in applied.added {
            info!("Now monitoring {}", destination);
            self.emit_event(ManagerEvent::DestinationAdded {
                destination,
                timestamp: ManagerEvent::current_timestamp(),
            });
        }
        for destination in applied.removed {
            info!("No longer monitoring {}", destination);
            self.emit_event(ManagerEvent::DestinationRemoved {
                destination,
                timestamp: ManagerEvent::current_timestamp(),
            });
        }
    }

    /// Publish one status to both sinks, isolating their failures
    ///
    /// Each sink gets at most `schedule.publish_timeout`; running out of time
    /// counts as a failed publish.
    async fn publish(&self, status: &PingStatus) {
        let limit = self.schedule.publish_timeout;
        let (metrics, traits) = tokio::join!(
            timeout(limit, self.metrics_sink.publish_metrics(status)),
            timeout(limit, self.traits_sink.publish_traits(status))
        );
        let timed_out = || CoreError::PublishError(format!("timed out after {:?}", limit));
        if let Err(e) = metrics.unwrap_or_else(|_| Err(timed_out())) {
            self.report_publish_failure(SinkKind::Metrics, status, &e);
        }
        if let Err(e) = traits.unwrap_or_else(|_| Err(timed_out())) {
            self.report_publish_failure(SinkKind::Traits, status, &e);
        }
    }

    fn report_publish_failure(&self, sink: SinkKind, status: &PingStatus, error: &CoreError) {
        warn!(
            "Failed to publish {:?} for {}: {}",
            sink, status.destination, error
        );
        self.emit_event(ManagerEvent::PublishFailed {
            sink,
            tenant_id: status.destination.tenant_id.clone(),
            resource_id: status.destination.resource_id.clone(),
            error: error.to_string(),
            timestamp: ManagerEvent::current_timestamp(),
        });
    }

    fn set_state(&self, state: CycleState) {
        self.state_tx.send_replace(state);
    }

    fn emit_event(&self, event: ManagerEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(id: &str) -> PingDestination {
        PingDestination::new("t", "e", id, "http://example.com", "GET")
    }

    #[test]
    fn test_in_flight_guard_rejects_second_probe() {
        let in_flight: DestinationSet = Arc::new(Mutex::new(HashSet::new()));

        let guard = InFlightGuard::acquire(&in_flight, &dest("a")).expect("first acquire");
        assert!(InFlightGuard::acquire(&in_flight, &dest("a")).is_none());

        let other = InFlightGuard::acquire(&in_flight, &dest("b"));
        assert!(other.is_some());
        assert_eq!(lock_set(&in_flight).len(), 2);

        drop(guard);
        assert!(InFlightGuard::acquire(&in_flight, &dest("a")).is_some());
    }

    #[test]
    fn test_in_flight_guard_released_on_drop() {
        let in_flight: DestinationSet = Arc::new(Mutex::new(HashSet::new()));
        {
            let _guard = InFlightGuard::acquire(&in_flight, &dest("a")).unwrap();
            assert_eq!(lock_set(&in_flight).len(), 1);
        }
        assert!(lock_set(&in_flight).is_empty());
    }
}
