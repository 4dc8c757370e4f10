//! # qiki_sim — the simulation tick engine
//!
//! Advances world state deterministically at a fixed period, publishes one
//! canonical telemetry snapshot per tick plus edge events on threshold
//! crossings, and serves the `sim.*` control command surface.
//!
//! Per tick, in order:
//!
//! 1. Integrate the lumped-node thermal network (explicit Euler).
//! 2. Compute power loads, sources, SoC; apply the shedding policy.
//! 3. Step the sensor plane (disabled sensors emit absent keys).
//! 4. Step the radar scene and run the track pipeline.
//! 5. Advance the docking state machine.
//! 6. Assemble and publish the telemetry snapshot.
//! 7. Emit one edge event per crossed threshold, with hysteresis.

pub mod commands;
pub mod config;
pub mod docking;
pub mod edge;
pub mod power;
pub mod probes;
pub mod scene;
pub mod sensors;
pub mod thermal;
pub mod tick;
pub mod world;

pub use config::SimConfig;
pub use tick::{SimTickConfig, SimTickLoop};
pub use world::World;
