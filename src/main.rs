use anyhow::Result;
use tokio::signal;

use notification_dispatch_core::config::Settings;
use notification_dispatch_core::metrics::encode_metrics;
use notification_dispatch_core::telemetry::init_telemetry;
use notification_dispatch_core::NotificationFacade;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    let _telemetry = init_telemetry(&settings.otel, &settings.log)?;
    tracing::info!("Configuration loaded");

    let facade = NotificationFacade::from_settings(&settings)?;
    tracing::info!(
        mail_transport = %settings.mail.transport,
        broadcast_transport = %settings.broadcast.transport,
        "Notification dispatch core started"
    );

    // Let subscribers know a fresh instance is up so they re-fetch state
    facade
        .broadcast_data_update("NotificationService", None, "STARTED")
        .await;

    shutdown_signal().await;

    tracing::info!("Draining pending mail deliveries...");
    facade.shutdown().await;

    let mail = facade.mail().stats();
    let router = facade.router().stats();
    tracing::info!(
        mail_delivered = mail.delivered,
        mail_failed = mail.failed,
        mail_rejected = mail.rejected,
        broadcasts_pushed = router.pushed,
        broadcasts_failed = router.failed,
        "Shutdown complete"
    );

    match encode_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Final metrics snapshot"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
