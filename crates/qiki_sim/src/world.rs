//! The canonical world state.
//!
//! Owns every subsystem and advances them in the fixed per-tick order. The
//! step result carries the telemetry snapshot, the radar products, and the
//! edge events that crossed a threshold this tick.

use std::collections::HashMap;

use chrono::Utc;
use glam::Vec3;
use serde_json::json;
use tracing::debug;

use qiki_contracts::event::{EventEnvelope, Severity, codes};
use qiki_contracts::hash::hardware_profile_hash;
use qiki_contracts::ids::mono_ns;
use qiki_contracts::radar::{EgoPose, RadarFrame, RadarTrack, TransponderMode};
use qiki_contracts::telemetry::{
    Attitude, CommsTelemetry, TelemetrySnapshot, ThermalTelemetry, XpdrTelemetry,
};
use qiki_net::subjects;
use qiki_radar::{GuardAlert, GuardEngine, TrackConfig, TrackStore};

use crate::config::SimConfig;
use crate::docking::{DockingBay, DockingError};
use crate::edge::EdgeTracker;
use crate::power::{FAULT_PDU_OVERCURRENT, PowerInputs, PowerSystem};
use crate::scene::RadarScene;
use crate::sensors::SensorPlaneSim;
use crate::thermal::ThermalNetwork;

/// An in-flight RCS burn.
#[derive(Debug, Clone)]
struct RcsBurn {
    axis: String,
    duty: f64,
    remaining_s: f64,
}

/// The result of one world step.
#[derive(Debug)]
pub struct WorldStep {
    /// The canonical snapshot for this tick.
    pub telemetry: TelemetrySnapshot,
    /// The radar frame, absent while the radar is shed.
    pub frame: Option<RadarFrame>,
    /// The active track set after this frame.
    pub tracks: Vec<RadarTrack>,
    /// Guard alerts that passed debounce.
    pub alerts: Vec<GuardAlert>,
    /// Edge events for crossed thresholds.
    pub edges: Vec<EventEnvelope>,
}

/// A refused world command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldCommandError {
    /// Transponder mode string was not one of ON/OFF/SILENT/SPOOF.
    #[error("invalid_mode")]
    InvalidMode,
    /// RCS parameters out of range.
    #[error("invalid_rcs_params")]
    InvalidRcsParams,
    /// Docking refused.
    #[error("{0}")]
    Docking(#[from] DockingError),
}

/// The canonical world.
pub struct World {
    config: SimConfig,
    thermal: ThermalNetwork,
    power: PowerSystem,
    sensors: SensorPlaneSim,
    docking: DockingBay,
    scene: RadarScene,
    tracks: TrackStore,
    guard: GuardEngine,
    edges: EdgeTracker,

    position_m: Vec3,
    velocity_mps: Vec3,
    attitude: Attitude,
    omega_rps: Vec3,
    xpdr_mode: TransponderMode,
    nbl_active: bool,
    rcs_burns: Vec<RcsBurn>,
    extra_heat: HashMap<String, f64>,
    tick_id: u64,
    profile_hash: String,
}

impl World {
    /// Build the world from its config.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let profile_hash =
            hardware_profile_hash(&config.hardware_profile, &config.hardware_manifest);
        let mut world = Self {
            thermal: ThermalNetwork::new(&config.thermal),
            power: PowerSystem::new(config.power.clone()),
            sensors: SensorPlaneSim::new(config.sensors.clone()),
            docking: DockingBay::new(&config.dock_default_port),
            scene: RadarScene::new(config.scene.clone()),
            tracks: TrackStore::new(TrackConfig::default()),
            guard: GuardEngine::new(config.guard.clone()),
            edges: EdgeTracker::new(),
            position_m: Vec3::ZERO,
            velocity_mps: Vec3::ZERO,
            attitude: Attitude::default(),
            omega_rps: Vec3::ZERO,
            xpdr_mode: config.initial_xpdr_mode,
            nbl_active: config.nbl_active,
            rcs_burns: Vec::new(),
            extra_heat: HashMap::new(),
            tick_id: 0,
            profile_hash,
            config,
        };
        world.prime_edges(world.xpdr_mode);
        world
    }

    /// Seed the edge tracker so boot values are not reported as edges.
    fn prime_edges(&mut self, xpdr_mode: TransponderMode) {
        self.edges.observe("soc_shed", json!(false));
        self.edges.observe("pdu_overcurrent", json!(false));
        self.edges
            .observe("xpdr_mode", serde_json::to_value(xpdr_mode).unwrap_or_default());
        self.edges.observe("docking_state", json!("idle"));
    }

    /// Current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// The deterministic hardware profile hash.
    #[must_use]
    pub fn profile_hash(&self) -> &str {
        &self.profile_hash
    }

    /// Inject extra heat into a thermal node (fault drills, tests).
    pub fn inject_heat(&mut self, node: &str, watts: f64) {
        if watts == 0.0 {
            self.extra_heat.remove(node);
        } else {
            self.extra_heat.insert(node.to_string(), watts);
        }
    }

    /// Set the transponder mode.
    ///
    /// # Errors
    ///
    /// Never fails for a typed mode; the string-validating path lives in
    /// the command layer.
    pub fn set_xpdr_mode(&mut self, mode: TransponderMode) {
        self.xpdr_mode = mode;
    }

    /// Schedule an RCS burn.
    ///
    /// # Errors
    ///
    /// Returns [`WorldCommandError::InvalidRcsParams`] unless the axis is
    /// roll/pitch/yaw and `duty` is in `[0, 1]` with a positive duration.
    pub fn rcs_burn(&mut self, axis: &str, duty: f64, duration_s: f64) -> Result<(), WorldCommandError> {
        if !matches!(axis, "roll" | "pitch" | "yaw")
            || !(0.0..=1.0).contains(&duty)
            || duration_s <= 0.0
        {
            return Err(WorldCommandError::InvalidRcsParams);
        }
        self.rcs_burns.push(RcsBurn {
            axis: axis.to_string(),
            duty,
            remaining_s: duration_s,
        });
        Ok(())
    }

    /// Engage a docking port.
    ///
    /// # Errors
    ///
    /// Propagates [`DockingError`] when the bay is busy.
    pub fn dock_engage(&mut self, port: Option<&str>) -> Result<(), WorldCommandError> {
        Ok(self.docking.engage(port)?)
    }

    /// Release the dock.
    ///
    /// # Errors
    ///
    /// Propagates [`DockingError`] when not docked.
    pub fn dock_release(&mut self) -> Result<(), WorldCommandError> {
        Ok(self.docking.release()?)
    }

    /// Command the NBL package on or off.
    pub fn set_nbl_active(&mut self, active: bool) {
        self.nbl_active = active;
    }

    /// Restore the initial world state.
    pub fn reset(&mut self) {
        self.thermal = ThermalNetwork::new(&self.config.thermal);
        self.power = PowerSystem::new(self.config.power.clone());
        self.sensors = SensorPlaneSim::new(self.config.sensors.clone());
        self.docking = DockingBay::new(&self.config.dock_default_port);
        self.scene.reset();
        self.tracks = TrackStore::new(TrackConfig::default());
        self.guard = GuardEngine::new(self.config.guard.clone());
        self.edges.clear();
        self.position_m = Vec3::ZERO;
        self.velocity_mps = Vec3::ZERO;
        self.attitude = Attitude::default();
        self.omega_rps = Vec3::ZERO;
        self.xpdr_mode = self.config.initial_xpdr_mode;
        self.nbl_active = self.config.nbl_active;
        self.rcs_burns.clear();
        self.extra_heat.clear();
        self.tick_id = 0;
        self.prime_edges(self.config.initial_xpdr_mode);
        debug!("world reset");
    }

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> WorldStep {
        self.tick_id += 1;
        let mut edge_events: Vec<EventEnvelope> = Vec::new();

        // 1. Thermal network.
        let mut heat = self.config.heat_w.clone();
        for (node, watts) in &self.extra_heat {
            *heat.entry(node.clone()).or_insert(0.0) += watts;
        }
        for trip in self.thermal.step(&heat, dt) {
            let severity = if trip.tripped {
                Severity::Warn
            } else {
                Severity::Info
            };
            edge_events.push(self.envelope(
                "thermal_trip",
                "thermal",
                severity,
                codes::FAULT + 10,
                json!({"subject": trip.node, "tripped": u8::from(trip.tripped)}),
            ));
        }

        // 2. Power and shedding.
        let inputs = PowerInputs {
            core_tripped: self.thermal.is_tripped("core"),
            pdu_tripped: self.thermal.is_tripped("pdu"),
            nbl_active: self.nbl_active,
            nbl_budget_ok: self.config.nbl_budget_ok,
            radar_on: true,
            xpdr_wants_power: self.xpdr_mode != TransponderMode::Off,
            motion_active: self.velocity_mps.length() > 0.01,
            rcs_active: !self.rcs_burns.is_empty(),
        };
        let power = self.power.step(&inputs, dt);

        // 3. Kinematics and sensor plane.
        self.apply_rcs(dt);
        self.position_m += self.velocity_mps * dt as f32;
        let sensor_plane = self.sensors.step(self.omega_rps, Vec3::ZERO, dt);

        // 4. Radar scene and track pipeline.
        self.scene.step(dt);
        let radar_shed = power.shed_loads.iter().any(|l| l == "radar");
        let ego = EgoPose {
            position_m: self.position_m,
            velocity_mps: self.velocity_mps,
            heading_rad: self.attitude.yaw_rad,
        };
        let (frame, tracks, alerts) = if radar_shed {
            (None, self.tracks.active_tracks(), Vec::new())
        } else {
            let frame = self.scene.frame(ego, self.config.sr_threshold_m);
            let tracks = self.tracks.process_frame(&frame, dt);
            let alerts = self.guard.evaluate(&tracks, self.position_m, frame.ts);
            (Some(frame), tracks, alerts)
        };

        // 5. Docking.
        self.docking.step(dt);

        // 6. Telemetry assembly.
        let xpdr_shed = power.shed_loads.iter().any(|l| l == "transponder");
        let xpdr_active = !xpdr_shed
            && matches!(self.xpdr_mode, TransponderMode::On | TransponderMode::Spoof);
        let xpdr_id = xpdr_active.then(|| match self.xpdr_mode {
            TransponderMode::Spoof => format!("{}-shadow", self.config.xpdr_id),
            _ => self.config.xpdr_id.clone(),
        });

        let telemetry = TelemetrySnapshot {
            schema_version: 1,
            source: self.config.source.clone(),
            ts_epoch: Utc::now(),
            mono_ns: mono_ns(),
            tick_id: self.tick_id,
            position_m: self.position_m,
            velocity_mps: self.velocity_mps,
            heading_rad: self.attitude.yaw_rad,
            attitude: self.attitude,
            battery_pct: power.soc_pct,
            cpu_pct: (12.0 + tracks.len() as f64 * 1.5).min(95.0),
            mem_pct: 34.0,
            hull_integrity_pct: 100.0,
            thermal: ThermalTelemetry {
                nodes: self.thermal.readings(),
            },
            power: power.clone(),
            radiation_usvh: self.sensors.radiation_usvh(),
            temp_external_c: Some(-40.0),
            temp_core_c: self.thermal.temp_c("core"),
            comms: CommsTelemetry {
                xpdr: XpdrTelemetry {
                    mode: self.xpdr_mode,
                    active: xpdr_active,
                    allowed: !xpdr_shed,
                    id: xpdr_id,
                },
            },
            docking: self.docking.telemetry(),
            sensor_plane,
            hardware_profile_hash: Some(self.profile_hash.clone()),
            extra: serde_json::Map::new(),
        };

        // 7. Remaining edge events.
        if let Some(value) = self.edges.observe("soc_shed", json!(self.power.soc_shed())) {
            edge_events.push(self.envelope(
                "soc_shed",
                "power",
                Severity::Warn,
                codes::FAULT + 20,
                json!({"engaged": value}),
            ));
        }
        let overcurrent = power
            .faults
            .iter()
            .any(|f| f == FAULT_PDU_OVERCURRENT);
        if let Some(value) = self.edges.observe("pdu_overcurrent", json!(overcurrent)) {
            edge_events.push(self.envelope(
                "pdu_overcurrent",
                "power",
                Severity::Error,
                codes::FAULT + 30,
                json!({"active": value}),
            ));
        }
        if let Some(value) = self
            .edges
            .observe("xpdr_mode", serde_json::to_value(self.xpdr_mode).unwrap_or_default())
        {
            edge_events.push(self.envelope(
                "xpdr_mode",
                "comms",
                Severity::Info,
                codes::CONTROL_IO + 20,
                json!({"mode": value}),
            ));
        }
        let dock_state = self.docking.telemetry().state;
        if let Some(value) = self.edges.observe("docking_state", json!(dock_state)) {
            edge_events.push(self.envelope(
                "docking_state",
                "docking",
                Severity::Info,
                codes::CONTROL_IO + 30,
                json!({"state": value}),
            ));
        }

        WorldStep {
            telemetry,
            frame,
            tracks,
            alerts,
            edges: edge_events,
        }
    }

    fn apply_rcs(&mut self, dt: f64) {
        let authority = self.config.rcs_authority_rps;
        let mut omega = Vec3::ZERO;
        for burn in &mut self.rcs_burns {
            let rate = authority * burn.duty as f32;
            match burn.axis.as_str() {
                "roll" => omega.x += rate,
                "pitch" => omega.y += rate,
                _ => omega.z += rate,
            }
            burn.remaining_s -= dt;
        }
        self.rcs_burns.retain(|burn| burn.remaining_s > 0.0);
        self.omega_rps = omega;
        self.attitude.roll_rad += omega.x * dt as f32;
        self.attitude.pitch_rad += omega.y * dt as f32;
        self.attitude.yaw_rad += omega.z * dt as f32;
    }

    fn envelope(
        &self,
        kind: &str,
        category: &str,
        severity: Severity,
        code: u16,
        payload: serde_json::Value,
    ) -> EventEnvelope {
        EventEnvelope::new(
            &self.config.source,
            subjects::EVENTS_AUDIT,
            kind,
            category,
            severity,
            code,
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::power::PowerConfig;
    use crate::scene::{ContactConfig, SceneConfig};

    use super::*;

    fn quiet_config() -> SimConfig {
        SimConfig {
            scene: SceneConfig::default(),
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_step_advances_tick_and_publishes_snapshot() {
        let mut world = World::new(quiet_config());
        let step = world.step(0.1);
        assert_eq!(step.telemetry.tick_id, 1);
        assert_eq!(step.telemetry.schema_version, 1);
        assert_eq!(step.telemetry.source, "q-sim");
    }

    #[test]
    fn test_profile_hash_is_stamped_into_telemetry() {
        let mut world = World::new(quiet_config());
        let hash = world.profile_hash().to_string();
        let step = world.step(0.1);
        assert_eq!(step.telemetry.hardware_profile_hash.as_deref(), Some(hash.as_str()));
        assert!(hash.starts_with("sha256:"));
    }

    #[test]
    fn test_quiet_boot_has_no_edges() {
        let mut world = World::new(quiet_config());
        let step = world.step(0.1);
        assert!(step.edges.is_empty());
    }

    #[test]
    fn test_pdu_overcurrent_shedding_order() {
        // 48 V × 10 A = 480 W against 600 W nominal: the canonical order
        // sheds nbl, radar, transponder, then throttles under the limit.
        let mut config = quiet_config();
        config.power = PowerConfig {
            max_a: 10.0,
            ..PowerConfig::default()
        };
        let mut world = World::new(config);
        world.velocity_mps = Vec3::new(1.0, 0.0, 0.0); // motion active
        world.rcs_burn("yaw", 0.5, 10.0).unwrap();

        let step = world.step(0.1);
        assert_eq!(
            step.telemetry.power.shed_loads,
            vec!["nbl".to_string(), "radar".to_string(), "transponder".to_string()]
        );
        assert!(step.telemetry.power.pdu_throttled);
        assert!(!step
            .telemetry
            .power
            .faults
            .contains(&FAULT_PDU_OVERCURRENT.to_string()));
    }

    #[test]
    fn test_core_trip_blocks_nbl_until_cooldown() {
        let mut world = World::new(quiet_config());

        // Drive the core hot.
        world.inject_heat("core", 2000.0);
        let mut trip_edges = 0;
        for _ in 0..2_000 {
            let step = world.step(1.0);
            trip_edges += step
                .edges
                .iter()
                .filter(|e| {
                    e.kind == "thermal_trip"
                        && e.payload["subject"] == "core"
                        && e.payload["tripped"] == 1
                })
                .count();
            if trip_edges > 0 {
                // NBL is shed with the thermal reason.
                let idx = step
                    .telemetry
                    .power
                    .shed_loads
                    .iter()
                    .position(|l| l == "nbl")
                    .unwrap();
                assert_eq!(step.telemetry.power.shed_reasons[idx], "thermal_overheat");
                break;
            }
        }
        assert_eq!(trip_edges, 1);

        // Cool down; after the clear edge NBL is no longer shed.
        world.inject_heat("core", 0.0);
        let mut cleared = false;
        for _ in 0..20_000 {
            let step = world.step(1.0);
            if step
                .edges
                .iter()
                .any(|e| e.kind == "thermal_trip" && e.payload["tripped"] == 0)
            {
                cleared = true;
            }
            if cleared {
                assert!(!step
                    .telemetry
                    .power
                    .shed_loads
                    .contains(&"nbl".to_string()));
                break;
            }
        }
        assert!(cleared);
    }

    #[test]
    fn test_unknown_close_contact_raises_one_alert() {
        let mut config = quiet_config();
        config.sr_threshold_m = 100.0;
        config.scene = SceneConfig {
            seed: 1,
            range_noise_m: 0.0,
            contacts: vec![ContactConfig {
                scene_id: 1,
                position_m: [60.0, 0.0, 0.0],
                velocity_mps: [0.0, 0.0, 0.0],
                transponder_id: None,
            }],
        };
        let mut world = World::new(config);

        let mut alert_count = 0;
        for _ in 0..200 {
            let step = world.step(0.1);
            alert_count += step
                .alerts
                .iter()
                .filter(|a| a.rule_id == "UNKNOWN_CONTACT_CLOSE")
                .count();
        }
        // Edge-triggered with debounce: exactly one within the window.
        assert_eq!(alert_count, 1);
    }

    #[test]
    fn test_xpdr_mode_change_is_an_edge() {
        let mut world = World::new(quiet_config());
        world.step(0.1);
        world.set_xpdr_mode(TransponderMode::Silent);
        let step = world.step(0.1);
        assert!(step.edges.iter().any(|e| e.kind == "xpdr_mode"));
        assert!(!step.telemetry.comms.xpdr.active);
    }

    #[test]
    fn test_invalid_rcs_params_refused() {
        let mut world = World::new(quiet_config());
        assert!(world.rcs_burn("yaw", 1.5, 1.0).is_err());
        assert!(world.rcs_burn("warp", 0.5, 1.0).is_err());
        assert!(world.rcs_burn("yaw", 0.5, 0.0).is_err());
    }

    #[test]
    fn test_rcs_burn_turns_the_craft() {
        let mut world = World::new(quiet_config());
        world.rcs_burn("yaw", 1.0, 1.0).unwrap();
        let step = world.step(0.5);
        assert!(step.telemetry.heading_rad > 0.0);
        // Burn expires after its duration.
        world.step(0.6);
        let step = world.step(0.1);
        assert_eq!(step.telemetry.sensor_plane.imu.unwrap().gyro_rps, Vec3::ZERO);
    }

    #[test]
    fn test_reset_restores_cold_state() {
        let mut world = World::new(quiet_config());
        world.rcs_burn("yaw", 1.0, 5.0).unwrap();
        world.step(1.0);
        world.reset();
        assert_eq!(world.tick_id(), 0);
        let step = world.step(0.1);
        assert_eq!(step.telemetry.tick_id, 1);
        assert!((step.telemetry.heading_rad).abs() < 1e-6);
    }
}
