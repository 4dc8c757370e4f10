//! Bridge relays.
//!
//! [`PullRoute`] drains a durable pull consumer and republishes every
//! message on a plain subject — lossless, deduplicated, acked after the
//! forward so redelivery covers a crash between fetch and publish.
//! [`TelemetryRelay`] forwards the non-persistent telemetry subject with a
//! latest-wins policy: when the forwarder lags, older snapshots are
//! dropped and counted, never queued without bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use qiki_net::streams::ConsumerSpec;
use qiki_net::{DedupWindow, NatsConnection, streams, subjects};

/// Forward/drop/duplicate counters, shared across relays.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Messages republished.
    pub forwarded: AtomicU64,
    /// Duplicates rejected by the dedup window.
    pub duplicates: AtomicU64,
    /// Snapshots dropped by latest-wins.
    pub dropped: AtomicU64,
}

impl BridgeMetrics {
    /// Snapshot the counters as (forwarded, duplicates, dropped).
    #[must_use]
    pub fn read(&self) -> (u64, u64, u64) {
        (
            self.forwarded.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}

/// A pull-consumer → plain-subject route.
#[derive(Debug, Clone)]
pub struct PullRoute {
    /// The durable pull consumer to drain.
    pub consumer: ConsumerSpec,
    /// The plain subject to republish on.
    pub out_subject: String,
}

impl PullRoute {
    /// The standing routes: frames, tracks, and audit out to the UI side.
    #[must_use]
    pub fn standing() -> Vec<Self> {
        streams::standing_consumers()
            .into_iter()
            .map(|consumer| {
                let out_subject = format!("qiki.ui.{}", consumer.durable);
                Self {
                    consumer,
                    out_subject,
                }
            })
            .collect()
    }

    /// Drain the consumer until shutdown, forwarding every first-sighted
    /// message. Persisted events are never sampled: each one is forwarded
    /// or redelivered, so back-pressure comes from `max_ack_pending`.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer cannot be bound.
    pub async fn run(
        &self,
        conn: &NatsConnection,
        metrics: Arc<BridgeMetrics>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let consumer = streams::ensure_pull_consumer(&conn.jetstream(), &self.consumer).await?;
        let dedup = DedupWindow::default();
        let mut messages = consumer.messages().await?;

        info!(
            durable = self.consumer.durable,
            out = self.out_subject,
            "pull route running"
        );

        loop {
            tokio::select! {
                next = messages.next() => {
                    let Some(next) = next else { break };
                    let msg = match next {
                        Ok(msg) => msg,
                        Err(err) => {
                            warn!(%err, durable = self.consumer.durable, "pull receive error");
                            continue;
                        }
                    };

                    let first = qiki_net::connection::message_id(&msg)
                        .map(|id| dedup.observe(&id))
                        .unwrap_or(true);
                    if first {
                        if let Err(err) = conn
                            .client()
                            .publish(self.out_subject.clone(), msg.payload.clone())
                            .await
                        {
                            // Leave un-acked: the stream redelivers.
                            warn!(%err, out = self.out_subject, "forward failed; leaving for redelivery");
                            continue;
                        }
                        metrics.forwarded.fetch_add(1, Ordering::Relaxed);
                    } else {
                        metrics.duplicates.fetch_add(1, Ordering::Relaxed);
                        debug!(durable = self.consumer.durable, "duplicate suppressed");
                    }

                    if let Err(err) = msg.ack().await {
                        warn!(%err, durable = self.consumer.durable, "ack failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(durable = self.consumer.durable, "pull route draining");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Latest-wins relay for the telemetry subject.
pub struct TelemetryRelay {
    /// The UI-side subject to forward on.
    pub out_subject: String,
}

impl Default for TelemetryRelay {
    fn default() -> Self {
        Self {
            out_subject: "qiki.ui.telemetry".to_string(),
        }
    }
}

impl TelemetryRelay {
    /// Run until shutdown. Snapshots that arrive while a forward is in
    /// flight replace the pending one; the replaced snapshot is counted as
    /// dropped. Latest-wins applies here because telemetry is UI-facing
    /// and non-persistent — a consumer always wants the newest state.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    pub async fn run(
        &self,
        conn: &NatsConnection,
        metrics: Arc<BridgeMetrics>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let mut sub = conn.subscribe(subjects::TELEMETRY).await?;
        info!(out = self.out_subject, "telemetry relay running");

        let mut pending: Option<async_nats::Message> = None;
        loop {
            // Collapse the backlog to the newest snapshot.
            while let Ok(Some(msg)) =
                tokio::time::timeout(std::time::Duration::ZERO, sub.next()).await
            {
                if pending.replace(msg).is_some() {
                    metrics.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }

            if let Some(msg) = pending.take() {
                if let Err(err) = conn
                    .client()
                    .publish(self.out_subject.clone(), msg.payload)
                    .await
                {
                    warn!(%err, "telemetry forward failed");
                } else {
                    metrics.forwarded.fetch_add(1, Ordering::Relaxed);
                }
            }

            tokio::select! {
                next = sub.next() => {
                    match next {
                        Some(msg) => {
                            if pending.replace(msg).is_some() {
                                metrics.dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("telemetry relay draining");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standing_routes_cover_standing_consumers() {
        let routes = PullRoute::standing();
        assert_eq!(routes.len(), streams::standing_consumers().len());
        for route in &routes {
            assert!(route.out_subject.starts_with("qiki.ui."));
        }
    }

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = BridgeMetrics::default();
        assert_eq!(metrics.read(), (0, 0, 0));
    }

    #[test]
    fn test_latest_wins_never_applies_to_persisted_subjects() {
        // The policy seam: only the telemetry subject qualifies.
        for route in PullRoute::standing() {
            assert!(!subjects::is_ui_facing(&route.consumer.filter));
        }
        assert!(subjects::is_ui_facing(subjects::TELEMETRY));
    }
}
