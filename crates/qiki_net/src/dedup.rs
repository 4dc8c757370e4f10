//! Consumer-side message-id deduplication.
//!
//! JetStream rejects duplicate ids inside the stream's duplicate window,
//! but at-least-once delivery still redelivers on missed acks. Consumers
//! therefore keep their own bounded window keyed by `Nats-Msg-Id` and make
//! every state mutation conditional on first sight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default deduplication window, matching the stream duplicate window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(120);

/// A bounded sliding window of seen message ids.
#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    seen: DashMap<String, Instant>,
    duplicates: AtomicU64,
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DedupWindow {
    /// Create a window of the given length.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: DashMap::new(),
            duplicates: AtomicU64::new(0),
        }
    }

    /// Observe a message id. Returns `true` if this is the first sighting
    /// within the window — the caller may mutate state. Returns `false` for
    /// a duplicate — the caller must ack and skip.
    pub fn observe(&self, message_id: &str) -> bool {
        let now = Instant::now();
        if let Some(first_seen) = self.seen.get(message_id)
            && now.duration_since(*first_seen) < self.window
        {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.seen.insert(message_id.to_string(), now);
        true
    }

    /// Drop entries older than the window. Call periodically.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let window = self.window;
        self.seen
            .retain(|_, first_seen| now.duration_since(*first_seen) < window);
    }

    /// Number of duplicates rejected since creation.
    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_passes() {
        let window = DedupWindow::default();
        assert!(window.observe("msg-1"));
    }

    #[test]
    fn test_second_sighting_is_rejected() {
        let window = DedupWindow::default();
        assert!(window.observe("msg-1"));
        assert!(!window.observe("msg-1"));
        assert_eq!(window.duplicate_count(), 1);
    }

    #[test]
    fn test_distinct_ids_pass() {
        let window = DedupWindow::default();
        assert!(window.observe("msg-1"));
        assert!(window.observe("msg-2"));
        assert_eq!(window.duplicate_count(), 0);
    }

    #[test]
    fn test_expired_id_passes_again() {
        let window = DedupWindow::new(Duration::from_millis(0));
        assert!(window.observe("msg-1"));
        // Zero-length window: the entry is immediately stale.
        assert!(window.observe("msg-1"));
    }

    #[test]
    fn test_evict_drops_stale_entries() {
        let window = DedupWindow::new(Duration::from_millis(0));
        window.observe("msg-1");
        window.observe("msg-2");
        window.evict_expired();
        assert_eq!(window.tracked(), 0);
    }
}
