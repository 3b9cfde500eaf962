// Procurement committee workflow service
// Exposes the workflow components, storage seams and HTTP surface for the
// binary and for integration tests

pub mod api;
pub mod auth;
pub mod blobs;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use api::{create_router, AppState};
pub use auth::{Principal, PrincipalResolver};
pub use blobs::{BlobReconciler, LocalObjectStore, ObjectStore};
pub use config::{config, init_config, CommitteeConfig};
pub use error::{WorkflowError, WorkflowResult};
pub use notifications::{NotificationDispatcher, OutboxRelay};
pub use shutdown::ShutdownCoordinator;
pub use store::{InMemoryStore, WorkflowStore};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{WorkflowContext, WorkflowOrchestrator};
