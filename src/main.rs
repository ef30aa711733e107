use std::sync::Arc;

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use battery_scm as scm;
use scm::events::{EventHandler, EventSender, MetricsEventHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = scm::config::load_config().context("failed to load configuration")?;
    scm::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = scm::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        scm::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(EventSender::new(event_tx));
    let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(MetricsEventHandler)];
    let event_worker = tokio::spawn(scm::events::process_events(event_rx, handlers));

    let addr = cfg.bind_address();
    let app_state = scm::AppState::new(db_arc.clone(), cfg, Some(event_sender));
    let app = scm::build_router(app_state);

    info!("battery-scm listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last senders; the worker drains what is left and stops.
    if let Err(e) = event_worker.await {
        error!("Event worker ended abnormally: {}", e);
    }

    match Arc::try_unwrap(db_arc) {
        Ok(pool) => scm::db::close_pool(pool).await?,
        Err(_) => info!("Database pool still shared at shutdown; leaving it to drop"),
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
    info!("Shutdown signal received");
}
