//! # q-operator — the incident service
//!
//! Subscribes to guard alerts and the audit subject, dedups alerts into
//! incidents, serves operator ack/clear actions, auto-clears on silence,
//! and publishes every lifecycle transition on the operator audit subject.
//!
//! `q-operator replay <file>` publishes a captured JSONL event file back
//! onto its canonical subjects and exits.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use qiki_contracts::command::{CommandEnvelope, CommandResponse};
use qiki_contracts::event::{EventEnvelope, codes};
use qiki_net::{DedupWindow, NatsConnection, connection, subjects};
use qiki_operator::incidents::{IncidentConfig, IncidentStore, LifecycleEvent};
use qiki_operator::{ingest, replay};
use qiki_radar::GuardAlert;

const EXIT_CONFIG: u8 = 2;
const EXIT_BUS: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

/// Auto-clear sweep period.
const SWEEP_PERIOD: Duration = Duration::from_secs(15);

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

    // Replay mode: push a capture file and exit.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("replay") {
        let Some(path) = args.get(2) else {
            error!("usage: q-operator replay <file>");
            return ExitCode::from(EXIT_CONFIG);
        };
        return match replay::replay(&conn, Path::new(path)).await {
            Ok(count) => {
                info!(count, "replayed");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(%err, "replay failed");
                ExitCode::from(EXIT_INTERNAL)
            }
        };
    }

    match run(&conn).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "operator loop failed");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}

async fn run(conn: &NatsConnection) -> anyhow::Result<()> {
    let store = IncidentStore::new(IncidentConfig::default());
    let dedup = DedupWindow::default();

    let mut alerts_sub = conn.subscribe(subjects::GUARD_ALERTS).await?;
    let mut audit_sub = conn.subscribe(subjects::EVENTS_AUDIT).await?;
    let mut command_sub = conn.subscribe(subjects::COMMANDS_CONTROL).await?;
    let mut sweep = tokio::time::interval(SWEEP_PERIOD);

    info!("operator incident store running");

    loop {
        tokio::select! {
            Some(msg) = alerts_sub.next() => {
                if !first_sighting(&dedup, &msg) {
                    continue;
                }
                match qiki_net::decode::<GuardAlert>(&msg.payload) {
                    Ok(alert) => {
                        let key = ingest::from_guard_alert(&alert);
                        if let Some(event) =
                            store.observe_alert(&key.rule_id, &key.target_key, key.severity, key.ts)
                        {
                            publish_lifecycle(conn, &event).await;
                        }
                    }
                    Err(err) => warn!(%err, "undecodable guard alert dropped"),
                }
            }
            Some(msg) = audit_sub.next() => {
                if !first_sighting(&dedup, &msg) {
                    continue;
                }
                match qiki_net::decode::<EventEnvelope>(&msg.payload) {
                    Ok(envelope) => {
                        if let Some(key) = ingest::from_audit_event(&envelope)
                            && let Some(event) = store.observe_alert(
                                &key.rule_id,
                                &key.target_key,
                                key.severity,
                                key.ts,
                            )
                        {
                            publish_lifecycle(conn, &event).await;
                        }
                    }
                    Err(err) => warn!(%err, "undecodable audit event dropped"),
                }
            }
            Some(msg) = command_sub.next() => {
                if let Ok(envelope) = qiki_net::decode::<CommandEnvelope>(&msg.payload)
                    && envelope.metadata.destination == "q-operator"
                {
                    let response = handle_action(&store, &envelope);
                    match &response {
                        Ok(event) => publish_lifecycle(conn, event).await,
                        Err(kind) => warn!(
                            command = envelope.command_name,
                            error = kind,
                            "operator action refused"
                        ),
                    }
                    let wire = match response {
                        Ok(_) => CommandResponse::ok(envelope.metadata.message_id),
                        Err(kind) => CommandResponse::err(envelope.metadata.message_id, &kind),
                    };
                    if let Err(err) = conn
                        .publish_json(subjects::RESPONSES_CONTROL, &wire)
                        .await
                    {
                        warn!(%err, "action response publish failed");
                    }
                }
            }
            _ = sweep.tick() => {
                for event in store.auto_clear_expired(chrono::Utc::now()) {
                    publish_lifecycle(conn, &event).await;
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
    Ok(())
}

/// Idempotent ingest: only the first sighting of a message id mutates the
/// store. Messages without the header pass (plain pub/sub telemetry path).
fn first_sighting(dedup: &DedupWindow, msg: &async_nats::Message) -> bool {
    match connection::message_id(msg) {
        Ok(id) => dedup.observe(&id),
        Err(_) => true,
    }
}

/// Apply an operator ack/clear action.
fn handle_action(
    store: &IncidentStore,
    envelope: &CommandEnvelope,
) -> Result<LifecycleEvent, String> {
    let rule_id = envelope
        .parameters
        .get("rule_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "invalid_params".to_string())?;
    let target_key = envelope
        .parameters
        .get("target_key")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    match envelope.command_name.as_str() {
        "operator.incident.ack" => store.ack(rule_id, target_key).map_err(|e| e.to_string()),
        "operator.incident.clear" => store.clear(rule_id, target_key).map_err(|e| e.to_string()),
        _ => Err("unknown_command".to_string()),
    }
}

/// Publish a lifecycle transition on the operator audit subject.
async fn publish_lifecycle(conn: &NatsConnection, event: &LifecycleEvent) {
    let incident = event.incident();
    let envelope = EventEnvelope::new(
        "q-operator",
        subjects::OPERATOR_ACTIONS,
        event.kind(),
        "operator",
        incident.severity,
        codes::GUARD + 10,
        serde_json::json!({
            "rule_id": incident.rule_id,
            "target_key": incident.target_key,
            "count": incident.count,
            "state": incident.state,
            "first_seen_ts": incident.first_seen_ts,
            "last_seen_ts": incident.last_seen_ts,
        }),
    );
    if let Err(err) = conn
        .publish_event(subjects::OPERATOR_ACTIONS, None, &envelope)
        .await
    {
        warn!(%err, kind = event.kind(), "lifecycle publish failed");
    }
}
