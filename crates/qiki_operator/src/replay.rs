//! Event record/replay.
//!
//! Captured events are appended to a JSONL file, one envelope per line.
//! Replay publishes each envelope back onto its recorded canonical
//! subject, which is enough to reproduce the downstream incident
//! behaviour without the original producer.

use std::io::Write;
use std::path::Path;

use tracing::info;

use qiki_contracts::event::EventEnvelope;
use qiki_net::NatsConnection;

/// Recording or replay failure.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// File I/O failed.
    #[error("replay file i/o: {0}")]
    Io(#[from] std::io::Error),
    /// An envelope could not be serialised for capture.
    #[error("envelope serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// A line is not a valid envelope.
    #[error("line {line} is not an event envelope: {source}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Publishing a replayed envelope failed.
    #[error("replay publish: {0}")]
    Publish(#[from] qiki_net::NetError),
}

/// Append one envelope to a JSONL capture file.
///
/// # Errors
///
/// Returns [`ReplayError::Io`] on write failure.
pub fn record(path: &Path, envelope: &EventEnvelope) -> Result<(), ReplayError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(envelope)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Read every envelope from a capture file.
///
/// # Errors
///
/// Returns [`ReplayError`] on read failure or a malformed line.
pub fn read_all(path: &Path) -> Result<Vec<EventEnvelope>, ReplayError> {
    let text = std::fs::read_to_string(path)?;
    let mut envelopes = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let envelope =
            serde_json::from_str(line).map_err(|source| ReplayError::Malformed {
                line: index + 1,
                source,
            })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

/// Replay a capture file: publish each envelope on its recorded subject.
///
/// # Errors
///
/// Returns [`ReplayError`] on read, parse, or publish failure.
pub async fn replay(conn: &NatsConnection, path: &Path) -> Result<usize, ReplayError> {
    let envelopes = read_all(path)?;
    for envelope in &envelopes {
        conn.publish_event(&envelope.subject, None, envelope).await?;
    }
    info!(count = envelopes.len(), path = %path.display(), "replay complete");
    Ok(envelopes.len())
}
