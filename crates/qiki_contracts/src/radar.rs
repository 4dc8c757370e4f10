//! Radar frames, detections, and tracks.
//!
//! The range band decides identity semantics: long-range (`LR`) detections
//! and tracks never carry a transponder identity; short-range (`SR`) ones
//! may. Validators enforce this at the pipeline boundary.

use chrono::{DateTime, Utc};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Range-band classification of a detection or track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RangeBand {
    /// Long range. Carries no identity.
    Lr,
    /// Short range. May carry identity/IFF.
    Sr,
}

/// Cooperative transponder (IFF) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransponderMode {
    /// Radiating the true identity.
    On,
    /// Not radiating.
    Off,
    /// Receiving only.
    Silent,
    /// Radiating a false identity.
    Spoof,
}

impl TransponderMode {
    /// Parse a wire-form mode string (`"ON"`, `"OFF"`, `"SILENT"`, `"SPOOF"`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ON" => Some(Self::On),
            "OFF" => Some(Self::Off),
            "SILENT" => Some(Self::Silent),
            "SPOOF" => Some(Self::Spoof),
            _ => None,
        }
    }
}

/// One raw detection within a radar frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarDetection {
    /// Bearing from ego, radians.
    pub bearing_rad: f32,
    /// Elevation from ego, radians.
    pub elevation_rad: f32,
    /// Slant range, metres.
    pub range_m: f64,
    /// Signal-to-noise ratio, dB.
    pub snr_db: f64,
    /// Range band of this detection.
    pub band: RangeBand,
    /// Scene object identifier (stable across frames for the same object).
    pub scene_id: u64,
    /// Transponder identity, SR only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transponder_id: Option<String>,
}

/// Ego pose attached to a radar frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EgoPose {
    /// Position, metres.
    pub position_m: Vec3,
    /// Velocity, m/s.
    pub velocity_mps: Vec3,
    /// Heading, radians.
    pub heading_rad: f32,
}

/// One radar frame: all detections of a single radar tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarFrame {
    /// Wall-clock timestamp of the frame.
    pub ts: DateTime<Utc>,
    /// Monotonic nanoseconds since producer process start.
    pub mono_ns: u64,
    /// Ego pose at frame time.
    pub ego: EgoPose,
    /// Detections in this frame.
    pub detections: Vec<RadarDetection>,
}

/// Track lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackStatus {
    /// Seen, not yet confirmed.
    New,
    /// Confirmed by consecutive hits.
    Tracked,
    /// Missed consecutively; pending retirement.
    Lost,
}

/// Kinematic state of a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPose {
    /// Position, metres.
    pub pos_m: Vec3,
    /// Velocity, m/s.
    pub vel_mps: Vec3,
    /// Orientation as Euler angles (roll/pitch/yaw), radians.
    pub euler_rad: Vec3,
    /// Angular rates, rad/s.
    pub omega_rps: Vec3,
}

/// A stateful radar track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarTrack {
    /// Stable track identifier.
    pub id: Uuid,
    /// Wall-clock timestamp of the last update.
    pub ts: DateTime<Utc>,
    /// Kinematic state.
    pub pose: TrackPose,
    /// Range band of the last associated detection.
    pub range_band: RangeBand,
    /// Observed transponder mode, SR only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transponder_mode: Option<TransponderMode>,
    /// Transponder identity, SR only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transponder_id: Option<String>,
    /// Whether a transponder identity is present. Always false in LR.
    pub id_present: bool,
    /// Track quality in `[0, 1]`: hits / (hits + misses) over a window.
    pub quality: f64,
    /// Lifecycle status.
    pub status: TrackStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_band_wire_form() {
        assert_eq!(serde_json::to_string(&RangeBand::Lr).unwrap(), "\"LR\"");
        assert_eq!(serde_json::to_string(&RangeBand::Sr).unwrap(), "\"SR\"");
    }

    #[test]
    fn test_transponder_mode_parse() {
        assert_eq!(TransponderMode::parse("ON"), Some(TransponderMode::On));
        assert_eq!(
            TransponderMode::parse("SPOOF"),
            Some(TransponderMode::Spoof)
        );
        assert_eq!(TransponderMode::parse("on"), None);
        assert_eq!(TransponderMode::parse("STEALTH"), None);
    }

    #[test]
    fn test_detection_without_identity_omits_key() {
        let detection = RadarDetection {
            bearing_rad: 0.1,
            elevation_rad: 0.0,
            range_m: 5000.0,
            snr_db: 12.0,
            band: RangeBand::Lr,
            scene_id: 3,
            transponder_id: None,
        };
        let json = serde_json::to_string(&detection).unwrap();
        assert!(!json.contains("transponder_id"));
    }

    #[test]
    fn test_track_roundtrip() {
        let track = RadarTrack {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            pose: TrackPose::default(),
            range_band: RangeBand::Sr,
            transponder_mode: Some(TransponderMode::On),
            transponder_id: Some("FRIEND-7".to_string()),
            id_present: true,
            quality: 0.9,
            status: TrackStatus::Tracked,
        };
        let json = serde_json::to_string(&track).unwrap();
        let restored: RadarTrack = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, track);
    }
}
