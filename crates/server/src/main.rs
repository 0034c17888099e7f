mod bootstrap;
mod dispatcher;
mod health;
#[cfg(test)]
mod testing;
mod webhooks;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use dialtone_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;

fn init_logging(config: &AppConfig) {
    use dialtone_core::config::LogFormat::*;
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
    // Logging needs the loaded config, so load it once and hand it to bootstrap.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let listener = TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "dialtone-server listening for webhooks"
    );

    let server =
        axum::serve(listener, app.router()).with_graceful_shutdown(wait_for_shutdown()).into_future();

    tokio::select! {
        result = server => result?,
        () = shutdown_deadline(grace) => {
            tracing::warn!(
                event_name = "system.server.shutdown_deadline",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight webhooks did not drain before the deadline"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "dialtone-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

/// Resolves `grace` after the shutdown signal; the drain is abandoned at that point.
async fn shutdown_deadline(grace: Duration) {
    wait_for_shutdown().await;
    tokio::time::sleep(grace).await;
}
