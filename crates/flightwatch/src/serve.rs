// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `flightwatch serve` command implementation.
//!
//! Builds the resolution and monitoring stack once, resumes persisted
//! monitoring jobs, logs monitoring events, purges expired keys, and waits
//! for SIGINT/SIGTERM.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flightwatch_config::model::FlightwatchConfig;
use flightwatch_core::FlightwatchError;
use flightwatch_monitor::Flightwatch;

pub async fn run_serve(config: FlightwatchConfig) -> Result<(), FlightwatchError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, backend = ?config.storage.backend, "starting flightwatch serve");

    let flightwatch = build(&config).await?;
    let shutdown = install_signal_handler();

    let logger = flightwatch
        .bus()
        .map(|bus| bus.spawn_logger(shutdown.child_token()));

    let purge = flightwatch.spawn_purge(
        Duration::from_secs(config.storage.purge_interval_secs),
        shutdown.child_token(),
    );

    let resumed = flightwatch.engine().resume().await?;
    info!(resumed, "flightwatch ready");

    shutdown.cancelled().await;

    flightwatch.shutdown().await;
    if let Err(e) = purge.await {
        warn!(error = %e, "purge task ended abnormally");
    }
    if let Some(logger) = logger {
        if let Err(e) = logger.await {
            warn!(error = %e, "event logger ended abnormally");
        }
    }
    info!("flightwatch stopped");
    Ok(())
}

/// Composition root shared by every subcommand.
pub async fn build(config: &FlightwatchConfig) -> Result<Flightwatch, FlightwatchError> {
    Flightwatch::builder(config.clone()).build().await
}

/// Returns a token cancelled on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not install SIGTERM handler, waiting for Ctrl+C");
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// `RUST_LOG` wins; otherwise `flightwatch={log_level},warn`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flightwatch={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
