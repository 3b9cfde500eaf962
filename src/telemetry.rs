use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::domain::UserId;

/// Initialize structured JSON logging.
///
/// `RUST_LOG` wins over `default_level`.
pub fn init_telemetry(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(filter)
        .try_init()?;

    tracing::info!("Procurement committee telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span for one orchestrated workflow operation
pub fn create_workflow_span(operation: &str, user_id: Option<UserId>, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "committee_workflow",
        operation = operation,
        user.id = user_id,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Create a span for one pass of a background task (relay, reconciler)
pub fn create_background_span(task: &str) -> tracing::Span {
    tracing::info_span!(
        "committee_background",
        task = task,
        correlation.id = %generate_correlation_id(),
        otel.kind = "internal"
    )
}

pub fn shutdown_telemetry() {
    tracing::info!("Procurement committee telemetry shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique_uuids() {
        let a = generate_correlation_id();
        let b = generate_correlation_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
