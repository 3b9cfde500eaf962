//! Application state for API handlers

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::auth::PrincipalResolver;
use crate::domain::NotificationEvent;
use crate::workflows::WorkflowOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WorkflowOrchestrator>,

    /// Caller identity resolution
    pub resolver: PrincipalResolver,

    /// Live notification channel fed by the outbox relay
    pub events: broadcast::Sender<NotificationEvent>,

    pub version: String,

    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Graceful shutdown signal sender
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<WorkflowOrchestrator>,
        resolver: PrincipalResolver,
        events: broadcast::Sender<NotificationEvent>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            orchestrator,
            resolver,
            events,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
            shutdown_tx,
        }
    }
}
