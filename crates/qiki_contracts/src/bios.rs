//! BIOS POST results and status.
//!
//! `BiosStatusEvent` is the exact wire payload of the
//! `qiki.events.v1.bios_status` subject; `BiosStatus` is the richer shape
//! served over HTTP and consumed by the agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// POST result codes: 0 pass, 1 degraded, 2 skipped, 3 fail.
pub const POST_PASS: u8 = 0;
/// Degraded but usable.
pub const POST_DEGRADED: u8 = 1;
/// Not tested.
pub const POST_SKIPPED: u8 = 2;
/// Failed; blocks `all_systems_go`.
pub const POST_FAIL: u8 = 3;

/// One device's power-on self-test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResult {
    /// Device identifier from the hardware profile.
    pub device_id: String,
    /// Human-readable device name, when the profile has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Status code in `0..=3`.
    pub status: u8,
    /// Optional status detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl PostResult {
    /// Whether this result blocks `all_systems_go`.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.status == POST_FAIL
    }
}

/// The BIOS status shape served over HTTP and consumed by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiosStatus {
    /// BIOS firmware version string.
    pub firmware_version: String,
    /// True iff no POST result is blocking and no required device is missing.
    pub all_systems_go: bool,
    /// Per-device POST results.
    pub post_results: Vec<PostResult>,
    /// Deterministic hardware profile hash (`"sha256:…"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile_hash: Option<String>,
    /// Seconds since BIOS process start.
    pub uptime_s: u64,
}

/// The exact wire payload of `qiki.events.v1.bios_status` (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiosStatusEvent {
    /// Always 1 in this major.
    pub event_schema_version: u32,
    /// Producing service.
    pub source: String,
    /// The subject the event was published on.
    pub subject: String,
    /// Wall-clock time of the report.
    pub timestamp: DateTime<Utc>,
    /// Per-device POST results.
    pub post_results: Vec<PostResult>,
    /// True iff the craft is go.
    pub all_systems_go: bool,
    /// Deterministic hardware profile hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_blocks() {
        let result = PostResult {
            device_id: "imu0".to_string(),
            device_name: None,
            status: POST_FAIL,
            status_message: Some("no response".to_string()),
        };
        assert!(result.is_blocking());
    }

    #[test]
    fn test_degraded_does_not_block() {
        let result = PostResult {
            device_id: "radar0".to_string(),
            device_name: Some("main radar".to_string()),
            status: POST_DEGRADED,
            status_message: None,
        };
        assert!(!result.is_blocking());
    }

    #[test]
    fn test_status_event_roundtrip() {
        let event = BiosStatusEvent {
            event_schema_version: 1,
            source: "q-bios".to_string(),
            subject: "qiki.events.v1.bios_status".to_string(),
            timestamp: Utc::now(),
            post_results: vec![PostResult {
                device_id: "imu0".to_string(),
                device_name: None,
                status: POST_PASS,
                status_message: None,
            }],
            all_systems_go: true,
            hardware_profile_hash: Some("sha256:00".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: BiosStatusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }
}
