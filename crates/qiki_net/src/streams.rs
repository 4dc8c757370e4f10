//! JetStream stream and consumer layout.
//!
//! Two persisted streams back the platform: `QIKI_RADAR_V1` for the radar
//! family and `QIKI_EVENTS_V1` for the event family. Both are file-backed,
//! bounded by size and age, discard-old, with a 120 s duplicate window.
//! Heavy consumers attach through durable pull consumers so back-pressure
//! exists by construction.

use std::time::Duration;

use async_nats::jetstream::{self, consumer::pull, stream};

use crate::error::NetError;
use crate::subjects;

/// Stream names.
pub mod names {
    /// The radar family stream.
    pub const RADAR: &str = "QIKI_RADAR_V1";
    /// The event family stream.
    pub const EVENTS: &str = "QIKI_EVENTS_V1";
}

/// Durable pull-consumer names.
pub mod durables {
    /// Radar frames for the bridge.
    pub const RADAR_FRAMES: &str = "radar_frames_pull";
    /// Radar tracks for the bridge.
    pub const RADAR_TRACKS: &str = "radar_tracks_pull";
    /// Audit events for the registrar.
    pub const EVENTS_AUDIT: &str = "events_audit_pull";
}

/// Stream duplicate window; consumer dedup windows match it.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(120);

/// Declarative stream configuration.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    /// Stream name.
    pub name: &'static str,
    /// Bound subjects.
    pub subjects: &'static [&'static str],
    /// Maximum retained messages.
    pub max_msgs: i64,
    /// Maximum retained bytes.
    pub max_bytes: i64,
    /// Maximum message age.
    pub max_age: Duration,
}

/// Declarative pull-consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerSpec {
    /// Owning stream.
    pub stream: &'static str,
    /// Durable name.
    pub durable: String,
    /// Filter subject.
    pub filter: String,
    /// Redelivery wait.
    pub ack_wait: Duration,
    /// In-flight ceiling; the back-pressure bound.
    pub max_ack_pending: i64,
}

/// All platform streams.
pub const STREAMS: &[StreamSpec] = &[
    StreamSpec {
        name: names::RADAR,
        subjects: &["qiki.radar.v1.*"],
        max_msgs: 500_000,
        max_bytes: 1024 * 1024 * 1024,
        max_age: Duration::from_secs(24 * 60 * 60),
    },
    StreamSpec {
        name: names::EVENTS,
        subjects: &["qiki.events.v1.>"],
        max_msgs: 1_000_000,
        max_bytes: 1024 * 1024 * 1024,
        max_age: Duration::from_secs(30 * 24 * 60 * 60),
    },
];

/// The standing durable consumers.
#[must_use]
pub fn standing_consumers() -> Vec<ConsumerSpec> {
    vec![
        ConsumerSpec {
            stream: names::RADAR,
            durable: durables::RADAR_FRAMES.to_string(),
            filter: subjects::RADAR_FRAMES.to_string(),
            ack_wait: Duration::from_secs(30),
            max_ack_pending: 512,
        },
        ConsumerSpec {
            stream: names::RADAR,
            durable: durables::RADAR_TRACKS.to_string(),
            filter: subjects::RADAR_TRACKS.to_string(),
            ack_wait: Duration::from_secs(30),
            max_ack_pending: 512,
        },
        ConsumerSpec {
            stream: names::EVENTS,
            durable: durables::EVENTS_AUDIT.to_string(),
            filter: subjects::EVENTS_AUDIT.to_string(),
            ack_wait: Duration::from_secs(30),
            max_ack_pending: 1024,
        },
    ]
}

/// A per-operator-session durable for a tracks feed.
///
/// `filter` is one of the tracks subjects (union, SR, or LR frames).
#[must_use]
pub fn operator_session_consumer(session: &str, filter: &str) -> ConsumerSpec {
    let short = filter.rsplit('.').next().unwrap_or("tracks");
    ConsumerSpec {
        stream: names::RADAR,
        durable: subjects::operator_durable(session, short),
        filter: filter.to_string(),
        ack_wait: Duration::from_secs(10),
        max_ack_pending: 128,
    }
}

/// Create or update a single stream.
///
/// # Errors
///
/// Returns [`NetError::JetStream`] on a management failure.
pub async fn ensure_stream(
    js: &jetstream::Context,
    spec: &StreamSpec,
) -> Result<stream::Stream, NetError> {
    let config = stream::Config {
        name: spec.name.to_string(),
        subjects: spec.subjects.iter().map(|s| (*s).to_string().into()).collect(),
        max_messages: spec.max_msgs,
        max_bytes: spec.max_bytes,
        max_age: spec.max_age,
        storage: stream::StorageType::File,
        retention: stream::RetentionPolicy::Limits,
        discard: stream::DiscardPolicy::Old,
        duplicate_window: DEDUP_WINDOW,
        ..Default::default()
    };
    let stream = js
        .get_or_create_stream(config)
        .await
        .map_err(|e| NetError::JetStream(e.to_string()))?;
    tracing::info!(stream = spec.name, "stream ready");
    Ok(stream)
}

/// Create or update every platform stream.
///
/// # Errors
///
/// Returns [`NetError::JetStream`] on the first management failure.
pub async fn ensure_streams(js: &jetstream::Context) -> Result<(), NetError> {
    for spec in STREAMS {
        ensure_stream(js, spec).await?;
    }
    Ok(())
}

/// Create or bind a durable pull consumer.
///
/// # Errors
///
/// Returns [`NetError::JetStream`] on a management failure.
pub async fn ensure_pull_consumer(
    js: &jetstream::Context,
    spec: &ConsumerSpec,
) -> Result<jetstream::consumer::Consumer<pull::Config>, NetError> {
    let stream = js
        .get_stream(spec.stream)
        .await
        .map_err(|e| NetError::JetStream(e.to_string()))?;
    let config = pull::Config {
        durable_name: Some(spec.durable.clone()),
        filter_subject: spec.filter.clone(),
        ack_wait: spec.ack_wait,
        max_ack_pending: spec.max_ack_pending,
        ..Default::default()
    };
    let consumer = stream
        .get_or_create_consumer(&spec.durable, config)
        .await
        .map_err(|e| NetError::JetStream(e.to_string()))?;
    tracing::info!(
        stream = spec.stream,
        durable = spec.durable,
        filter = spec.filter,
        "pull consumer ready"
    );
    Ok(consumer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_layout_covers_both_families() {
        let names: Vec<&str> = STREAMS.iter().map(|s| s.name).collect();
        assert!(names.contains(&names::RADAR));
        assert!(names.contains(&names::EVENTS));
    }

    #[test]
    fn test_standing_consumers_filter_their_subjects() {
        let consumers = standing_consumers();
        let audit = consumers
            .iter()
            .find(|c| c.durable == durables::EVENTS_AUDIT)
            .unwrap();
        assert_eq!(audit.filter, subjects::EVENTS_AUDIT);
        assert_eq!(audit.stream, names::EVENTS);
    }

    #[test]
    fn test_every_consumer_sets_backpressure_bounds() {
        for spec in standing_consumers() {
            assert!(spec.max_ack_pending > 0);
            assert!(spec.ack_wait > Duration::ZERO);
        }
    }

    #[test]
    fn test_operator_session_durable_name() {
        let spec = operator_session_consumer("ab12", subjects::RADAR_TRACKS_SR);
        assert_eq!(spec.durable, "operator_ab12_sr");
        assert_eq!(spec.filter, subjects::RADAR_TRACKS_SR);
    }
}
