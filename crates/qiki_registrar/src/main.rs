//! # q-registrar — the audit log service
//!
//! Drains the events stream through a durable pull consumer, validates
//! each envelope, appends it to the daily backup file, and prunes expired
//! files. Ingestion is idempotent per message id; a redelivered event is
//! acked without a second write.

use std::process::ExitCode;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use qiki_contracts::event::EventEnvelope;
use qiki_net::streams::{self, ConsumerSpec};
use qiki_net::{DedupWindow, NatsConnection, connection, subjects};
use qiki_registrar::{AuditLog, LogConfig};

const EXIT_CONFIG: u8 = 2;
const EXIT_BUS: u8 = 3;

/// Environment variable naming the backup directory.
const BACKUP_DIR_ENV: &str = "QIKI_BACKUP_DIR";

/// Retention sweep period.
const PRUNE_PERIOD: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backup_dir =
        std::env::var(BACKUP_DIR_ENV).unwrap_or_else(|_| "backups".to_string());
    let mut log = match AuditLog::open(LogConfig::new(&backup_dir)) {
        Ok(log) => log,
        Err(err) => {
            error!(%err, "audit log unavailable");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let conn = match NatsConnection::connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!(%err, "bus unreachable");
            return ExitCode::from(EXIT_BUS);
        }
    };

    let js = conn.jetstream();
    if let Err(err) = streams::ensure_streams(&js).await {
        error!(%err, "stream setup failed");
        return ExitCode::from(EXIT_BUS);
    }

    // The registrar drains the whole event family, not just audit.
    let spec = ConsumerSpec {
        stream: streams::names::EVENTS,
        durable: "registrar_events_pull".to_string(),
        filter: subjects::EVENTS_WILDCARD.to_string(),
        ack_wait: Duration::from_secs(30),
        max_ack_pending: 1024,
    };
    let consumer = match streams::ensure_pull_consumer(&js, &spec).await {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(%err, "consumer setup failed");
            return ExitCode::from(EXIT_BUS);
        }
    };
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "consumer stream failed");
            return ExitCode::from(EXIT_BUS);
        }
    };

    let dedup = DedupWindow::default();
    let mut prune = tokio::time::interval(PRUNE_PERIOD);
    info!(backup_dir, "registrar running");

    loop {
        tokio::select! {
            next = messages.next() => {
                let Some(next) = next else { break };
                let msg = match next {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(%err, "pull receive error");
                        continue;
                    }
                };

                let first = connection::message_id(&msg)
                    .map(|id| dedup.observe(&id))
                    .unwrap_or(true);
                if first {
                    match qiki_net::decode::<EventEnvelope>(&msg.payload) {
                        Ok(envelope) => {
                            if let Err(err) = log.append(&envelope) {
                                // Leave un-acked so the stream redelivers.
                                error!(%err, "append failed; leaving for redelivery");
                                continue;
                            }
                        }
                        // Validation failure: drop with WARN, ack below so
                        // the poison message is not redelivered forever.
                        Err(err) => warn!(%err, "invalid envelope dropped"),
                    }
                }

                if let Err(err) = msg.ack().await {
                    warn!(%err, "ack failed");
                }
            }
            _ = prune.tick() => {
                if let Err(err) = log.prune(chrono::Utc::now().date_naive()) {
                    warn!(%err, "prune failed");
                }
                dedup.evict_expired();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    conn.flush().await.ok();
    info!("registrar shut down");
    drop(log);
    ExitCode::SUCCESS
}
