use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use super::ObjectStore;
use crate::store::{StoreResult, WorkflowStore};
use crate::telemetry::create_background_span;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Retries object-store deletes that failed while the owning row was removed
pub struct BlobReconciler {
    store: Arc<dyn WorkflowStore>,
    objects: Arc<dyn ObjectStore>,
    batch_size: usize,
    interval: Duration,
}

impl BlobReconciler {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        objects: Arc<dyn ObjectStore>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            objects,
            batch_size,
            interval,
        }
    }

    pub async fn run_once(&self) -> StoreResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for mut pending in self.store.list_pending_deletions(self.batch_size).await? {
            match self.objects.delete(&pending.handle).await {
                Ok(()) => {
                    self.store.delete_pending_deletion(pending.id).await?;
                    debug!(handle = %pending.handle, "Reconciled blob delete");
                    report.deleted += 1;
                }
                Err(e) => {
                    pending.attempts += 1;
                    pending.last_error = e.to_string();
                    warn!(
                        handle = %pending.handle,
                        attempts = pending.attempts,
                        error = %e,
                        "Blob delete still failing"
                    );
                    self.store.update_pending_deletion(&pending).await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Loop until the shutdown flag flips to `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Blob reconciler started");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().instrument(create_background_span("blob_reconciler")).await {
                        warn!(error = %e, "Blob reconciliation pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Blob reconciler stopped");
    }
}
