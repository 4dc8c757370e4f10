//! The canonical per-tick telemetry snapshot.
//!
//! One snapshot is published per simulation tick. Extra keys are allowed and
//! preserved; missing data is an absent key. Consumers must treat any field
//! other than `schema_version` and `source` as optional.

use chrono::{DateTime, Utc};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::radar::TransponderMode;

/// Attitude in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    /// Roll angle, radians.
    pub roll_rad: f32,
    /// Pitch angle, radians.
    pub pitch_rad: f32,
    /// Yaw angle, radians.
    pub yaw_rad: f32,
}

/// One lumped thermal node reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalNodeReading {
    /// Node identifier (e.g. `"core"`, `"pdu"`).
    pub id: String,
    /// Node temperature, °C.
    pub temp_c: f64,
}

/// Thermal section of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermalTelemetry {
    /// All lumped-node readings for this tick.
    pub nodes: Vec<ThermalNodeReading>,
}

/// Power section of the snapshot.
///
/// `shed_loads` and `shed_reasons` are insertion-ordered lists without
/// duplicates; the order is the canonical shedding order for this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerTelemetry {
    /// State of charge, percent.
    pub soc_pct: f64,
    /// Total load, watts.
    pub loads_w: f64,
    /// Total source power, watts.
    pub sources_w: f64,
    /// Loads currently shed, in shedding order.
    pub shed_loads: Vec<String>,
    /// Reason per shed load, parallel with `shed_loads`.
    pub shed_reasons: Vec<String>,
    /// Whether the PDU throttled motion/rcs this tick.
    pub pdu_throttled: bool,
    /// Active power faults (e.g. `"PDU_OVERCURRENT"`).
    pub faults: Vec<String>,
}

/// Transponder status within the comms section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpdrTelemetry {
    /// Commanded transponder mode.
    pub mode: TransponderMode,
    /// Whether the transponder is actually radiating.
    pub active: bool,
    /// Whether the power policy currently allows the transponder.
    pub allowed: bool,
    /// Broadcast identifier, when radiating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Comms section of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommsTelemetry {
    /// Transponder status.
    pub xpdr: XpdrTelemetry,
}

/// Docking section of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockingTelemetry {
    /// Docking state machine state (e.g. `"idle"`, `"engaged"`).
    pub state: String,
    /// The engaged port, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Whether a hard-dock connection is established.
    pub connected: bool,
}

/// IMU reading within the sensor plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// Angular rates, rad/s.
    pub gyro_rps: Vec3,
    /// Linear acceleration, m/s².
    pub accel_mps2: Vec3,
}

/// Sensor-plane section of the snapshot.
///
/// A disabled sensor is an absent key, never a fabricated zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorPlane {
    /// IMU reading, when the IMU is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu: Option<ImuReading>,
    /// Accumulated radiation dose, µSv, when the dosimeter is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiation_dose_usv: Option<f64>,
}

/// The canonical telemetry snapshot, one per simulation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Wire schema version. Always 1 in this major.
    pub schema_version: u32,
    /// Producing service (e.g. `"q-sim"`).
    pub source: String,
    /// Wall-clock timestamp of the tick.
    pub ts_epoch: DateTime<Utc>,
    /// Monotonic nanoseconds since producer process start.
    pub mono_ns: u64,
    /// Tick counter of the producing sim.
    pub tick_id: u64,
    /// Position in the scene frame, metres.
    pub position_m: Vec3,
    /// Velocity, m/s.
    pub velocity_mps: Vec3,
    /// Heading, radians.
    pub heading_rad: f32,
    /// Attitude (roll/pitch/yaw), radians.
    pub attitude: Attitude,
    /// Battery state of charge, percent.
    pub battery_pct: f64,
    /// CPU utilisation, percent.
    pub cpu_pct: f64,
    /// Memory utilisation, percent.
    pub mem_pct: f64,
    /// Hull integrity, percent.
    pub hull_integrity_pct: f64,
    /// Thermal network readings.
    pub thermal: ThermalTelemetry,
    /// Power state and shedding.
    pub power: PowerTelemetry,
    /// Radiation rate, µSv/h, when the dosimeter is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiation_usvh: Option<f64>,
    /// External skin temperature, °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_external_c: Option<f64>,
    /// Core temperature, °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_core_c: Option<f64>,
    /// Comms status.
    pub comms: CommsTelemetry,
    /// Docking status.
    pub docking: DockingTelemetry,
    /// Sensor-plane readings.
    pub sensor_plane: SensorPlane,
    /// Deterministic hardware profile hash (`"sha256:…"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile_hash: Option<String>,
    /// Unknown extra keys, preserved on round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySnapshot {
        TelemetrySnapshot {
            schema_version: 1,
            source: "q-sim".to_string(),
            ts_epoch: Utc::now(),
            mono_ns: 42,
            tick_id: 7,
            position_m: Vec3::new(1.0, 2.0, 3.0),
            velocity_mps: Vec3::ZERO,
            heading_rad: 0.5,
            attitude: Attitude::default(),
            battery_pct: 87.5,
            cpu_pct: 12.0,
            mem_pct: 30.0,
            hull_integrity_pct: 100.0,
            thermal: ThermalTelemetry {
                nodes: vec![ThermalNodeReading {
                    id: "core".to_string(),
                    temp_c: 41.2,
                }],
            },
            power: PowerTelemetry {
                soc_pct: 87.5,
                loads_w: 120.0,
                sources_w: 200.0,
                shed_loads: vec![],
                shed_reasons: vec![],
                pdu_throttled: false,
                faults: vec![],
            },
            radiation_usvh: Some(0.12),
            temp_external_c: Some(-40.0),
            temp_core_c: Some(41.2),
            comms: CommsTelemetry {
                xpdr: XpdrTelemetry {
                    mode: TransponderMode::On,
                    active: true,
                    allowed: true,
                    id: Some("QIKI-01".to_string()),
                },
            },
            docking: DockingTelemetry::default(),
            sensor_plane: SensorPlane::default(),
            hardware_profile_hash: Some("sha256:ab".to_string()),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_serialise_deserialise_serialise_is_byte_equal() {
        let snapshot = sample();
        let first = serde_json::to_string(&snapshot).unwrap();
        let restored: TelemetrySnapshot = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&restored).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let mut snapshot = sample();
        snapshot
            .extra
            .insert("vendor_field".to_string(), Value::from(123));
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.extra.get("vendor_field"), Some(&Value::from(123)));
    }

    #[test]
    fn test_disabled_sensor_is_absent_key() {
        let mut snapshot = sample();
        snapshot.radiation_usvh = None;
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("radiation_usvh"));
    }
}
