//! # Structured Logging Module
//!
//! Environment-aware structured logging for the gateway and its background
//! workflows. JSON output by default, human-readable output on request.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. `RUST_LOG` wins over the configured level.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

        let layer = if config.format == "json" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter));

        // A global subscriber may already be installed by tests or an embedding binary
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            level = %config.level,
            format = %config.format,
            "Structured logging initialized"
        );
    });
}

/// Log one step of an orchestration workflow
pub fn log_workflow_step(
    workflow: &str,
    step: &str,
    target: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        workflow = %workflow,
        step = %step,
        target = %target,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "WORKFLOW_STEP"
    );
}

/// Log a remote call made by one of the service clients
pub fn log_remote_call(service: &str, operation: &str, status: &str, details: Option<&str>) {
    tracing::debug!(
        service = %service,
        operation = %operation,
        status = %status,
        details = details,
        "REMOTE_CALL"
    );
}
