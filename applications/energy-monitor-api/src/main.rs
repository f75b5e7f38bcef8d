use std::sync::Arc;

use energy_monitor_api::{
    api::{self, AppState},
    config::Config,
    db,
    repositories::Stores,
    scheduler::BillingScheduler,
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting energy-monitor-api");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!("Configuration loaded");

    let pool = db::connect(&cfg.database).await?;
    db::migrate(&pool).await?;
    info!("Connected to database, migrations applied");

    let state = AppState::new(Stores::postgres(pool.clone()), &cfg, Some(pool))?;

    let scheduler_handle = if cfg.billing.scheduler_enabled {
        let scheduler = BillingScheduler::new(
            Arc::clone(&state.billing),
            cfg.billing.run_at_hour,
            cfg.billing.local_offset()?,
        );
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        info!("Billing scheduler disabled");
        None
    };

    let router = api::create_router(state);
    let addr = cfg.api_bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "API server error");
    }

    if let Some(handle) = scheduler_handle {
        handle.abort();
    }

    info!("Application shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
