use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

/// Graceful shutdown coordinator for the API server and background tasks
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx, tasks: Vec::new() }
    }

    pub fn sender(&self) -> watch::Sender<bool> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Track a background task so shutdown waits for it
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    /// Flip the shutdown flag; every subscriber sees it on its next select
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves on SIGINT/SIGTERM or an in-process trigger, then flips the flag
    pub fn wait_for_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        let mut rx = self.subscribe();

        async move {
            let in_process = async move {
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            };

            tokio::select! {
                _ = shutdown_signal() => info!("Shutdown signal received"),
                _ = in_process => info!("Shutdown requested"),
            }
            tx.send_replace(true);
        }
    }

    /// Wait for tracked tasks, giving each at most `grace`
    pub async fn drain(self, grace: Duration) -> Result<()> {
        info!(tasks = self.tasks.len(), "Initiating graceful shutdown of background tasks...");

        let mut timed_out = 0;
        for (name, handle) in self.tasks {
            match timeout(grace, handle).await {
                Ok(Ok(())) => info!(task = name, "Task stopped"),
                Ok(Err(e)) => warn!(task = name, error = %e, "Task ended abnormally"),
                Err(_) => {
                    warn!(task = name, "Timeout waiting for task to stop");
                    timed_out += 1;
                }
            }
        }

        if timed_out > 0 {
            return Err(anyhow::anyhow!("{timed_out} task(s) did not stop within {grace:?}"));
        }
        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_stops_tracked_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.track(
            "waiter",
            tokio::spawn(async move {
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            }),
        );

        coordinator.trigger();
        coordinator.drain(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_process_trigger_resolves_wait() {
        let coordinator = ShutdownCoordinator::new();
        let wait = tokio::spawn(coordinator.wait_for_shutdown());
        coordinator.trigger();
        tokio::time::timeout(Duration::from_secs(1), wait).await.unwrap().unwrap();
        assert!(*coordinator.subscribe().borrow());
    }

    #[tokio::test]
    async fn test_drain_reports_stuck_tasks() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.track("stuck", tokio::spawn(std::future::pending::<()>()));
        assert!(coordinator.drain(Duration::from_millis(20)).await.is_err());
    }
}
