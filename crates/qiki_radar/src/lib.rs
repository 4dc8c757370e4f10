//! # qiki_radar
//!
//! The radar pipeline: per-frame detections flow through range-band
//! classification into a stateful track store, and the resulting track set
//! is evaluated against the guard rule set each frame.
//!
//! - [`band`] — LR/SR classification and LR identity stripping.
//! - [`alpha_beta`] — the α-β filter over polar track state.
//! - [`store`] — association, lifecycle, and quality of tracks.
//! - [`guard`] — the YAML-configured guard rule engine with debounce.

pub mod alpha_beta;
pub mod band;
pub mod guard;
pub mod store;

pub use guard::{GuardAlert, GuardEngine, GuardRules};
pub use store::{TrackConfig, TrackStore};
