use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn, Instrument};

use crate::domain::NotificationEvent;
use crate::store::{StoreResult, WorkflowStore};
use crate::telemetry::create_background_span;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Moves persisted notifications onto the push channel
///
/// Delivery is at-least-once from the relay's side and unacknowledged from
/// the consumer's side. A row is given up on once `attempts` reaches
/// `max_attempts`.
pub struct OutboxRelay {
    store: Arc<dyn WorkflowStore>,
    sender: broadcast::Sender<NotificationEvent>,
    max_attempts: u32,
    batch_size: usize,
    interval: Duration,
}

impl OutboxRelay {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        sender: broadcast::Sender<NotificationEvent>,
        max_attempts: u32,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            max_attempts,
            batch_size,
            interval,
        }
    }

    pub async fn run_once(&self) -> StoreResult<RelayReport> {
        let mut report = RelayReport::default();
        let batch = self
            .store
            .list_undelivered(self.max_attempts, self.batch_size)
            .await?;

        for mut notification in batch {
            let event = NotificationEvent::from(&notification);
            match self.sender.send(event) {
                Ok(receivers) => {
                    notification.delivered_at = Some(Utc::now());
                    notification.last_error = None;
                    debug!(notification_id = notification.id, receivers, "Delivered notification");
                    report.delivered += 1;
                }
                Err(_) => {
                    notification.attempts += 1;
                    notification.last_error = Some("no active subscribers".to_string());
                    if notification.attempts >= self.max_attempts {
                        warn!(
                            notification_id = notification.id,
                            attempts = notification.attempts,
                            "Giving up on notification delivery"
                        );
                    }
                    report.failed += 1;
                }
            }
            self.store.update_notification(&notification).await?;
        }

        Ok(report)
    }

    /// Loop until the shutdown flag flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            max_attempts = self.max_attempts,
            "Outbox relay started"
        );
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().instrument(create_background_span("outbox_relay")).await {
                        Ok(report) if report.delivered + report.failed > 0 => {
                            debug!(delivered = report.delivered, failed = report.failed, "Relay pass complete");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Outbox relay pass failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Outbox relay stopped");
    }
}
