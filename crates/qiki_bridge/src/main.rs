//! # q-bridge — the backplane bridge
//!
//! Runs one task per pull route plus the telemetry relay, reports
//! forward/duplicate/drop counters periodically, and drains everything on
//! shutdown.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use qiki_bridge::{BridgeMetrics, PullRoute, TelemetryRelay};
use qiki_net::{NatsConnection, streams};

const EXIT_BUS: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

/// Metrics report period.
const REPORT_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let conn = match NatsConnection::connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!(%err, "bus unreachable");
            return ExitCode::from(EXIT_BUS);
        }
    };

    if let Err(err) = streams::ensure_streams(&conn.jetstream()).await {
        error!(%err, "stream setup failed");
        return ExitCode::from(EXIT_BUS);
    }

    let metrics = Arc::new(BridgeMetrics::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    for route in PullRoute::standing() {
        let conn = conn.clone();
        let metrics = Arc::clone(&metrics);
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = route.run(&conn, metrics, shutdown).await {
                error!(%err, durable = route.consumer.durable, "pull route failed");
            }
        }));
    }
    {
        let conn = conn.clone();
        let metrics = Arc::clone(&metrics);
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let relay = TelemetryRelay::default();
            if let Err(err) = relay.run(&conn, metrics, shutdown).await {
                error!(%err, "telemetry relay failed");
            }
        }));
    }

    let mut report = tokio::time::interval(REPORT_PERIOD);
    loop {
        tokio::select! {
            _ = report.tick() => {
                let (forwarded, duplicates, dropped) = metrics.read();
                info!(forwarded, duplicates, dropped, "bridge counters");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Drain: signal every relay, then wait for them to finish.
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if task.await.is_err() {
            error!("relay task panicked");
            return ExitCode::from(EXIT_INTERNAL);
        }
    }

    conn.flush().await.ok();
    info!("bridge shut down");
    ExitCode::SUCCESS
}
