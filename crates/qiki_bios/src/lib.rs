//! # qiki_bios
//!
//! The BIOS service: loads the hardware profile, runs POST over the
//! declared devices, computes the deterministic profile hash, publishes
//! status events periodically and on change, and serves the status over
//! HTTP.

pub mod http;
pub mod post;
pub mod profile;
pub mod status;

pub use profile::{DeviceSpec, HardwareProfile};
pub use status::StatusPublisher;
