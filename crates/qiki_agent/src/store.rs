//! The SSOT FSM state store.
//!
//! Process-local single source of truth for agent FSM state. Exactly one
//! writer exists per process — the tick orchestrator — and the public API
//! makes a second writer unobtainable: [`FsmWriter`] is not `Clone` and
//! [`FsmStore::take_writer`] hands it out once.
//!
//! Snapshots are stored as canonical serialised bytes; `set` is a no-op
//! unless the bytes differ, and `version` increments exactly when they do.
//! Readers get immutable views and never observe a torn snapshot.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use qiki_contracts::fsm::FsmSnapshot;
use qiki_contracts::ids::BootId;

/// Default subscriber queue capacity before drop-oldest applies.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// Store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The snapshot could not be canonically serialised.
    #[error("snapshot serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// An immutable view of the current snapshot.
#[derive(Debug, Clone)]
pub struct FsmView {
    /// The snapshot. Shared read-only; mutation requires a fresh write
    /// through the single writer.
    pub snapshot: Arc<FsmSnapshot>,
    /// Store version of this snapshot.
    pub version: u64,
    /// Process boot id; disambiguates versions across restarts.
    pub boot_id: BootId,
}

struct SubscriberQueue {
    queue: Mutex<VecDeque<FsmView>>,
    capacity: usize,
    notify: tokio::sync::Notify,
}

/// A registered subscriber. Receives the current snapshot immediately on
/// subscribe, then every change. Slow subscribers lose oldest entries.
pub struct FsmSubscription {
    shared: Arc<SubscriberQueue>,
    dropped: Arc<AtomicU64>,
}

impl FsmSubscription {
    /// Pop the next queued view without waiting.
    pub fn try_recv(&self) -> Option<FsmView> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Wait for the next queued view.
    pub async fn recv(&self) -> FsmView {
        loop {
            if let Some(view) = self.try_recv() {
                return view;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Views dropped across all subscribers of the store.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct StoreState {
    bytes: Vec<u8>,
    snapshot: Arc<FsmSnapshot>,
    version: u64,
    log_json: Option<Arc<String>>,
    subscribers: Vec<Arc<SubscriberQueue>>,
}

struct StoreInner {
    boot_id: BootId,
    state: Mutex<StoreState>,
    writer_taken: AtomicBool,
    dropped: Arc<AtomicU64>,
}

/// Reader handle to the store. Cheap to clone; many readers are expected.
#[derive(Clone)]
pub struct FsmStore {
    inner: Arc<StoreInner>,
}

/// The single writer handle. Not `Clone`; obtainable exactly once.
pub struct FsmWriter {
    inner: Arc<StoreInner>,
}

impl FsmStore {
    /// Create the store with the initial `BOOTING`/`COLD_START` snapshot at
    /// version 0, so logs never observe an absent state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if the initial snapshot cannot be
    /// serialised.
    pub fn new(source_module: &str) -> Result<Self, StoreError> {
        let snapshot = FsmSnapshot::cold_start(source_module);
        let bytes = serde_json::to_vec(&snapshot)?;
        let inner = StoreInner {
            boot_id: BootId::generate(),
            state: Mutex::new(StoreState {
                bytes,
                snapshot: Arc::new(snapshot),
                version: 0,
                log_json: None,
                subscribers: Vec::new(),
            }),
            writer_taken: AtomicBool::new(false),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Take the single writer. Returns `None` on every call after the
    /// first — there is exactly one writer per process.
    pub fn take_writer(&self) -> Option<FsmWriter> {
        if self.inner.writer_taken.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(FsmWriter {
                inner: Arc::clone(&self.inner),
            })
        }
    }

    /// The process boot id.
    #[must_use]
    pub fn boot_id(&self) -> BootId {
        self.inner.boot_id.clone()
    }

    /// An immutable view of the current snapshot.
    #[must_use]
    pub fn get(&self) -> FsmView {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        FsmView {
            snapshot: Arc::clone(&state.snapshot),
            version: state.version,
            boot_id: self.inner.boot_id.clone(),
        }
    }

    /// The log form `{version, boot_id, snapshot}`, cached per version so
    /// hot logging never reserialises.
    #[must_use]
    pub fn get_json_for_logs(&self) -> Arc<String> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = &state.log_json {
            return Arc::clone(cached);
        }
        let rendered = serde_json::json!({
            "version": state.version,
            "boot_id": self.inner.boot_id.as_str(),
            "snapshot": &*state.snapshot,
        });
        let rendered = Arc::new(rendered.to_string());
        state.log_json = Some(Arc::clone(&rendered));
        rendered
    }

    /// Register a subscriber queue. The current snapshot is delivered
    /// immediately; each change thereafter is enqueued. A full queue drops
    /// its oldest entry and the drop is counted.
    #[must_use]
    pub fn subscribe(&self, capacity: usize) -> FsmSubscription {
        let shared = Arc::new(SubscriberQueue {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            notify: tokio::sync::Notify::new(),
        });

        // Deliver the current snapshot and register under one lock, so no
        // write can slip between the two.
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = FsmView {
            snapshot: Arc::clone(&state.snapshot),
            version: state.version,
            boot_id: self.inner.boot_id.clone(),
        };
        {
            let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(current);
        }
        shared.notify.notify_one();
        state.subscribers.push(Arc::clone(&shared));

        FsmSubscription {
            shared,
            dropped: Arc::clone(&self.inner.dropped),
        }
    }

    /// Total views dropped from slow subscriber queues.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl FsmWriter {
    /// Write a snapshot. If its canonical bytes equal the stored ones the
    /// call is a no-op; otherwise the snapshot is stored and `version`
    /// increments. Returns the current version either way.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] if the snapshot cannot be
    /// serialised. The store keeps its previous state in that case.
    pub fn set(&self, snapshot: &FsmSnapshot) -> Result<u64, StoreError> {
        let bytes = serde_json::to_vec(snapshot)?;
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.bytes == bytes {
            return Ok(state.version);
        }
        state.bytes = bytes;
        state.snapshot = Arc::new(snapshot.clone());
        state.version += 1;
        state.log_json = None;
        debug!(version = state.version, state = ?snapshot.state, "fsm snapshot written");

        let view = FsmView {
            snapshot: Arc::clone(&state.snapshot),
            version: state.version,
            boot_id: self.inner.boot_id.clone(),
        };
        for subscriber in &state.subscribers {
            let mut queue = subscriber.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= subscriber.capacity {
                queue.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(view.clone());
            subscriber.notify.notify_one();
        }
        Ok(state.version)
    }

    /// The process boot id.
    #[must_use]
    pub fn boot_id(&self) -> BootId {
        self.inner.boot_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qiki_contracts::fsm::FsmState;

    use super::*;

    fn store_and_writer() -> (FsmStore, FsmWriter) {
        let store = FsmStore::new("agent").unwrap();
        let writer = store.take_writer().unwrap();
        (store, writer)
    }

    #[test]
    fn test_initial_snapshot_is_cold_start_at_version_zero() {
        let (store, _writer) = store_and_writer();
        let view = store.get();
        assert_eq!(view.version, 0);
        assert_eq!(view.snapshot.state, FsmState::Booting);
        assert_eq!(view.snapshot.reason, "COLD_START");
    }

    #[test]
    fn test_writer_is_obtainable_exactly_once() {
        let store = FsmStore::new("agent").unwrap();
        assert!(store.take_writer().is_some());
        assert!(store.take_writer().is_none());
    }

    #[test]
    fn test_version_increments_iff_bytes_differ() {
        let (store, writer) = store_and_writer();
        let boot = store.get().snapshot.as_ref().clone();
        let ts = Utc::now();
        let idle = boot.transition(FsmState::Idle, "BOOT_COMPLETE", ts);

        let v1 = writer.set(&idle).unwrap();
        assert_eq!(v1, 1);

        // Identical bytes: no-op.
        let v_same = writer.set(&idle).unwrap();
        assert_eq!(v_same, 1);

        // Different bytes: increment.
        let active = idle.transition(FsmState::Active, "PROPOSALS_ACTIVE", ts);
        assert_eq!(writer.set(&active).unwrap(), 2);
    }

    #[test]
    fn test_set_same_snapshot_n_times_is_idempotent() {
        let (store, writer) = store_and_writer();
        let idle = store
            .get()
            .snapshot
            .transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        for _ in 0..5 {
            writer.set(&idle).unwrap();
        }
        assert_eq!(store.get().version, 1);
    }

    #[test]
    fn test_boot_id_is_constant_and_hex16() {
        let (store, writer) = store_and_writer();
        let before = store.boot_id();
        assert_eq!(before.as_str().len(), 16);
        let idle = store
            .get()
            .snapshot
            .transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        writer.set(&idle).unwrap();
        assert_eq!(store.boot_id(), before);
        assert_eq!(store.get().boot_id, before);
    }

    #[test]
    fn test_log_json_is_cached_per_version() {
        let (store, writer) = store_and_writer();
        let first = store.get_json_for_logs();
        let again = store.get_json_for_logs();
        assert!(Arc::ptr_eq(&first, &again));

        let idle = store
            .get()
            .snapshot
            .transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        writer.set(&idle).unwrap();
        let after = store.get_json_for_logs();
        assert!(!Arc::ptr_eq(&first, &after));
        assert!(after.contains("\"version\":1"));
        assert!(after.contains("IDLE"));
    }

    #[test]
    fn test_subscriber_receives_current_then_changes() {
        let (store, writer) = store_and_writer();
        let subscription = store.subscribe(8);

        // Immediate delivery of the current snapshot.
        let first = subscription.try_recv().unwrap();
        assert_eq!(first.version, 0);

        let idle = store
            .get()
            .snapshot
            .transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        writer.set(&idle).unwrap();
        let second = subscription.try_recv().unwrap();
        assert_eq!(second.version, 1);
        assert_eq!(second.snapshot.state, FsmState::Idle);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let (store, writer) = store_and_writer();
        let subscription = store.subscribe(2);

        let mut snapshot = store.get().snapshot.as_ref().clone();
        for i in 0..4 {
            let next = if i % 2 == 0 {
                FsmState::Idle
            } else {
                FsmState::Active
            };
            snapshot = snapshot.transition(next, "flip", Utc::now());
            writer.set(&snapshot).unwrap();
        }

        // Capacity 2: the initial view and early changes were dropped.
        assert!(store.dropped_total() > 0);
        let newest_first = subscription.try_recv().unwrap();
        assert!(newest_first.version >= 3);
    }

    #[test]
    fn test_views_are_immutable_shares_not_copies() {
        let (store, _writer) = store_and_writer();
        let a = store.get();
        let b = store.get();
        assert!(Arc::ptr_eq(&a.snapshot, &b.snapshot));
    }

    #[tokio::test]
    async fn test_async_recv_wakes_on_write() {
        let (store, writer) = store_and_writer();
        let subscription = store.subscribe(8);
        // Drain the immediate delivery.
        let _ = subscription.try_recv();

        let idle = store
            .get()
            .snapshot
            .transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        writer.set(&idle).unwrap();
        let view = subscription.recv().await;
        assert_eq!(view.snapshot.state, FsmState::Idle);
    }
}
