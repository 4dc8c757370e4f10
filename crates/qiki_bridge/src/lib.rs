//! # qiki_bridge
//!
//! Translates between the persisted JetStream side of the backplane and
//! plain pub/sub for UI-facing consumers. Pull consumers give
//! back-pressure by construction; the bridge adds the consumer-side dedup
//! window and a latest-wins policy that applies **only** to UI-facing
//! subjects — persisted events are never sampled.

pub mod relay;

pub use relay::{BridgeMetrics, PullRoute, TelemetryRelay};
