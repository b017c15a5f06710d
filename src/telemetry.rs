use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level when set. JSON output carries the
/// current span and span list so workflow fields appear on every event.
pub fn init_telemetry(observability: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))?;

    let json_layer = observability.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });
    let plain_layer = (!observability.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()?;

    tracing::info!("Warm transfer telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one webhook
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one orchestrator handler; `session.id` is recorded once known.
pub fn create_workflow_span(operation: &str, branch: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "transfer_workflow",
        operation = operation,
        branch = branch,
        session.id = tracing::field::Empty,
        correlation.id = correlation_id,
    )
}
