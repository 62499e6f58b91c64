//! Inventory event intake
//!
//! Inventory notifications reach the pinger either as [`InventoryEvent`]
//! values on a channel or as newline-delimited JSON. Both paths feed the
//! same [`UrlChangesCollector`]; the ping manager picks the changes up at
//! its next merge.

use crate::collector::UrlChangesCollector;
use schema::InventoryEvent;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters of one intake task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Events recorded into the collector
    pub recorded: u64,
    /// Well-formed events that did not describe a URL resource
    pub ignored: u64,
    /// NDJSON lines that could not be parsed
    pub malformed: u64,
}

impl IntakeStats {
    fn record(&mut self, collector: &UrlChangesCollector, event: &InventoryEvent) {
        if collector.record(event) {
            self.recorded += 1;
        } else {
            self.ignored += 1;
        }
    }
}

/// Record every event received on `events` until all senders are dropped
pub fn spawn_inventory_listener(
    mut events: mpsc::Receiver<InventoryEvent>,
    collector: Arc<UrlChangesCollector>,
) -> JoinHandle<IntakeStats> {
    tokio::spawn(async move {
        let mut stats = IntakeStats::default();
        while let Some(event) = events.recv().await {
            stats.record(&collector, &event);
        }
        info!(
            "Inventory listener stopped after {} recorded and {} ignored events",
            stats.recorded, stats.ignored
        );
        stats
    })
}

/// Read newline-delimited [`InventoryEvent`] JSON from `reader` until EOF
///
/// Blank lines are skipped. A malformed line is logged and skipped; a read
/// error stops the reader.
pub fn spawn_ndjson_reader<R>(reader: R, collector: Arc<UrlChangesCollector>) -> JoinHandle<IntakeStats>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut stats = IntakeStats::default();
        let mut line_no = 0u64;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    line_no += 1;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InventoryEvent>(line) {
                        Ok(event) => stats.record(&collector, &event),
                        Err(e) => {
                            warn!("Skipping malformed inventory event on line {}: {}", line_no, e);
                            stats.malformed += 1;
                        }
                    }
                }
                Ok(None) => {
                    debug!("Inventory event stream reached EOF after {} lines", line_no);
                    break;
                }
                Err(e) => {
                    warn!("Error reading inventory events after line {}: {}", line_no, e);
                    break;
                }
            }
        }

        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{InventoryAction, PingDestination};
    use std::collections::HashSet;

    fn url_event(action: InventoryAction, id: &str) -> InventoryEvent {
        InventoryEvent::url_resource(action, "tenant", "test", id, "http://example.com", None)
    }

    #[tokio::test]
    async fn test_listener_records_until_senders_drop() {
        let collector = Arc::new(UrlChangesCollector::new());
        let (tx, rx) = mpsc::channel(8);
        let listener = spawn_inventory_listener(rx, collector.clone());

        tx.send(url_event(InventoryAction::Created, "a")).await.unwrap();
        tx.send(url_event(InventoryAction::Created, "b")).await.unwrap();
        let mut other = url_event(InventoryAction::Created, "db");
        other.resource.resource_type = "Database".to_string();
        tx.send(other).await.unwrap();
        drop(tx);

        let stats = listener.await.unwrap();
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.ignored, 1);

        let mut working_set = HashSet::new();
        collector.apply(&mut working_set);
        assert_eq!(working_set.len(), 2);
    }

    #[tokio::test]
    async fn test_ndjson_reader_skips_blank_and_malformed_lines() {
        let created = serde_json::to_string(&url_event(InventoryAction::Created, "a")).unwrap();
        let deleted = serde_json::to_string(&url_event(InventoryAction::Deleted, "b")).unwrap();
        let input = format!("{created}\n\n{{not json\n   \n{deleted}\n");

        let collector = Arc::new(UrlChangesCollector::new());
        let stats = spawn_ndjson_reader(std::io::Cursor::new(input.into_bytes()), collector.clone())
            .await
            .unwrap();

        assert_eq!(
            stats,
            IntakeStats {
                recorded: 2,
                ignored: 0,
                malformed: 1,
            }
        );
        let mut working_set = HashSet::from([PingDestination::new(
            "tenant",
            "test",
            "b",
            "http://example.com",
            "GET",
        )]);
        let applied = collector.apply(&mut working_set);
        assert_eq!(applied.added.len(), 1);
        assert_eq!(applied.removed.len(), 1);
    }

    #[tokio::test]
    async fn test_ndjson_reader_accepts_camel_case_events() {
        let input = r#"{"action":"created","tenantId":"hawkular","environmentId":"test","resource":{"id":"site","resourceType":"URL","properties":{"url":"http://hawkular.github.io","method":"HEAD"}}}"#;
        let collector = Arc::new(UrlChangesCollector::new());
        let stats = spawn_ndjson_reader(input.as_bytes(), collector.clone())
            .await
            .unwrap();
        assert_eq!(stats.recorded, 1);

        let mut working_set = HashSet::new();
        collector.apply(&mut working_set);
        let destination = working_set.into_iter().next().unwrap();
        assert_eq!(destination.url, "http://hawkular.github.io");
        assert_eq!(destination.http_method, "HEAD");
    }
}
