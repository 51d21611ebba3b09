//! # KG Integration Server
//!
//! Standalone HTTP server for the gateway.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults plus config/kg_integration.toml when present
//! cargo run --bin kg-integration-server
//!
//! # Explicit file and overrides
//! KG_INTEGRATION_CONFIG=/etc/kg_integration.toml \
//! KG_INTEGRATION__SERVER__PORT=6064 cargo run --bin kg-integration-server
//! ```

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use kg_integration::config::Settings;
use kg_integration::events::{log_activity, ActivityLog, ActivityPublisher};
use kg_integration::execution::BackgroundDispatcher;
use kg_integration::logging::init_structured_logging;
use kg_integration::orchestration::{RemoteServices, SpaceProvisioner};
use kg_integration::store::RecordStores;
use kg_integration::web::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_structured_logging(&settings.logging);

    info!(
        app = %settings.app_name,
        version = %settings.version,
        environment = %settings.environment,
        "Starting KG integration server"
    );

    let stores = RecordStores::connect(&settings.database)
        .await
        .context("connecting the record store")?;
    let services = RemoteServices::from_settings(&settings).context("building service clients")?;
    let publisher = Arc::new(ActivityPublisher::from_config(&settings.events));
    let activity_consumer = publisher.spawn_consumer(log_activity);
    let activity = ActivityLog::new(publisher);
    let dispatcher = BackgroundDispatcher::new();

    let state = AppState::new(&settings, services, stores, dispatcher.clone(), activity);

    if settings.reconciliation.interval_seconds > 0 {
        spawn_reconciliation(
            state.provisioner.clone(),
            Duration::from_secs(settings.reconciliation.interval_seconds),
            state.reconcile_grace,
        );
    }

    let router = build_router(state, Duration::from_millis(settings.server.request_timeout_ms));
    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(address = %address, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!(pending = dispatcher.pending(), "Waiting for background work to finish");
    dispatcher.wait_idle().await;
    // Ends on its own once the last publisher handle is dropped
    if tokio::time::timeout(Duration::from_secs(1), activity_consumer).await.is_err() {
        warn!("Activity consumer still running at shutdown");
    }
    info!("KG integration server stopped");
    Ok(())
}

/// Periodic sweep re-queueing failed and stale pending spaces
fn spawn_reconciliation(provisioner: SpaceProvisioner, every: Duration, grace: Duration) {
    info!(interval_seconds = every.as_secs(), "Space reconciliation enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match provisioner.reconcile(grace).await {
                Ok(requeued) if !requeued.is_empty() => {
                    info!(count = requeued.len(), spaces = ?requeued, "Re-queued spaces");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Space reconciliation failed"),
            }
        }
    });
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
