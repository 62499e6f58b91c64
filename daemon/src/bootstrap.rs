//! Daemon bootstrap: wire the pinger, sinks, inventory intake and manager
//!
//! This module loads the configuration, seeds the collector with the
//! configured destinations, starts the inventory event reader and spawns
//! the ping manager. [`run_once`] runs a single cycle without a timer.

use pinger_core::config::load_config_from_toml_path;
use pinger_core::inventory::{spawn_ndjson_reader, IntakeStats};
use pinger_core::{
    create_pinger, spawn_manager, CycleReport, ManagerConfig, ManagerHandle, MetricsSink,
    PingManager, Pinger, Schedule, TracingSink, TraitsSink, UrlChangesCollector,
};
use schema::{ManagerEvent, PingerConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{DaemonError, Result};

/// How long shutdown waits for the manager to finish its current cycle
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Capacity of the manager event bus
const EVENT_BUS_CAPACITY: usize = 1024;

/// Load the configuration, or the defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<PingerConfig> {
    match path {
        Some(path) => {
            let config = load_config_from_toml_path(path)?;
            info!(
                "Loaded config from {} ({} destinations)",
                path.display(),
                config.destinations.len()
            );
            Ok(config)
        }
        None => {
            debug!("No config file given, using defaults");
            Ok(PingerConfig::default())
        }
    }
}

/// The probe and publish implementations the manager drives
#[allow(missing_debug_implementations)]
pub struct Components {
    #[allow(missing_docs)]
    pub pinger: Arc<dyn Pinger>,
    #[allow(missing_docs)]
    pub metrics_sink: Arc<dyn MetricsSink>,
    #[allow(missing_docs)]
    pub traits_sink: Arc<dyn TraitsSink>,
}

impl Components {
    /// HTTP pinger publishing to the log
    pub fn production(config: &PingerConfig) -> Result<Self> {
        let pinger = create_pinger(config)
            .map_err(|e| DaemonError::StartupError(format!("failed to build HTTP client: {}", e)))?;
        let sink = Arc::new(TracingSink);
        Ok(Self {
            pinger,
            metrics_sink: sink.clone(),
            traits_sink: sink,
        })
    }

    fn into_manager_config(
        self,
        config: &PingerConfig,
        collector: Arc<UrlChangesCollector>,
        event_tx: broadcast::Sender<ManagerEvent>,
    ) -> ManagerConfig {
        ManagerConfig {
            schedule: Schedule::from(config),
            pinger: self.pinger,
            metrics_sink: self.metrics_sink,
            traits_sink: self.traits_sink,
            collector,
            event_tx,
        }
    }
}

/// Handle to manage the running components
#[allow(missing_debug_implementations)]
pub struct BootstrapHandle {
    #[allow(missing_docs)]
    pub config: PingerConfig,
    #[allow(missing_docs)]
    pub manager: ManagerHandle,
    intake_task: Option<JoinHandle<IntakeStats>>,
    event_log_task: JoinHandle<()>,
}

impl BootstrapHandle {
    /// Wait until the inventory event source is exhausted
    ///
    /// Returns `None` when no event source was configured.
    pub async fn wait_for_intake(&mut self) -> Option<IntakeStats> {
        let task = self.intake_task.take()?;
        match task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Inventory reader task failed: {}", e);
                None
            }
        }
    }

    /// Initiate graceful shutdown: stop the manager and the intake task
    pub async fn shutdown(mut self) {
        if let Some(task) = self.intake_task.take() {
            task.abort();
        }
        if self.manager.shutdown().is_ok()
            && tokio::time::timeout(SHUTDOWN_GRACE, self.manager.closed())
                .await
                .is_err()
        {
            warn!("Ping manager did not stop within {:?}", SHUTDOWN_GRACE);
        }
        self.event_log_task.abort();
        info!("Bootstrap shutdown complete");
    }
}

/// Open an NDJSON event source; `-` reads standard input
async fn open_events(path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        DaemonError::ConfigError(format!("Failed to open events {}: {}", path.display(), e))
    })?;
    Ok(Box::new(file))
}

/// Collector seeded with the configured destinations
fn seeded_collector(config: &PingerConfig) -> Arc<UrlChangesCollector> {
    let collector = Arc::new(UrlChangesCollector::new());
    for destination in &config.destinations {
        collector.record_created(destination.clone());
    }
    collector
}

fn spawn_event_logger(mut events: broadcast::Receiver<ManagerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(event = %json, "manager event"),
                    Err(e) => warn!("Failed to serialize manager event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event logger lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Bootstrap the daemon with the production components
pub async fn bootstrap(config: PingerConfig, events: Option<&Path>) -> Result<BootstrapHandle> {
    let components = Components::production(&config)?;
    bootstrap_with(config, events, components).await
}

/// Bootstrap the daemon with the given components
pub async fn bootstrap_with(
    config: PingerConfig,
    events: Option<&Path>,
    components: Components,
) -> Result<BootstrapHandle> {
    let collector = seeded_collector(&config);

    let intake_task = match events {
        Some(path) => {
            let reader = open_events(path).await?;
            info!("Reading inventory events from {}", path.display());
            Some(spawn_ndjson_reader(reader, collector.clone()))
        }
        None => None,
    };

    let (event_tx, event_rx) = broadcast::channel(EVENT_BUS_CAPACITY);
    let event_log_task = spawn_event_logger(event_rx);
    let manager = spawn_manager(components.into_manager_config(&config, collector, event_tx));

    Ok(BootstrapHandle {
        config,
        manager,
        intake_task,
        event_log_task,
    })
}

/// Run a single cycle after the event source is exhausted
pub async fn run_once(
    config: &PingerConfig,
    events: Option<&Path>,
    components: Components,
) -> Result<CycleReport> {
    let collector = seeded_collector(config);
    if let Some(path) = events {
        let reader = open_events(path).await?;
        let stats = spawn_ndjson_reader(reader, collector.clone())
            .await
            .map_err(|e| DaemonError::StartupError(format!("inventory reader failed: {}", e)))?;
        info!(
            "Read {} inventory events ({} ignored, {} malformed)",
            stats.recorded, stats.ignored, stats.malformed
        );
    }

    let (event_tx, event_rx) = broadcast::channel(EVENT_BUS_CAPACITY);
    let event_log_task = spawn_event_logger(event_rx);
    let mut manager = PingManager::new(components.into_manager_config(config, collector, event_tx));
    let report = manager.run_cycle().await;
    event_log_task.abort();
    Ok(report)
}
