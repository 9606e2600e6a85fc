mod admin;
mod app;
mod auth;
mod bootstrap;
mod error;
mod health;
mod maintenance;
mod orders;
mod partners;
mod pricing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use goldsmith_core::config::{AppConfig, LoadOptions};
use goldsmith_db::repositories::SqlMetalPriceRepository;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use goldsmith_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so connection and migration failures are visible.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let scheduler = if app.config.pricing.enabled {
        let feed = pricing::HttpPriceFeed::from_config(&app.config.pricing)?;
        let store = SqlMetalPriceRepository::new(app.db_pool.clone());
        Some(pricing::spawn_scheduler(Arc::new(feed), Arc::new(store), app.config.pricing.clone()))
    } else {
        info!(event_name = "pricing.scheduler.disabled", "metal price refresh is disabled");
        None
    };

    let address = app.config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "goldsmith-server listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let router = app::router(app.state.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            if let Some(scheduler) = scheduler {
                scheduler.abort();
            }
            joined??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "goldsmith-server stopping"
    );
    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not drain before the grace period ended"
        ),
    }
    app.db_pool.close().await;

    Ok(())
}
