//! Guard rule engine.
//!
//! Rules are loaded from `guard_rules.yaml` — the single home of every
//! numeric threshold — and evaluated against the track set each frame.
//! Alerts are edge-triggered with a per-`(rule, target)` debounce: once a
//! pair has fired, repeats inside the window are suppressed and only move
//! the incident's `last_seen_ts` downstream.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use qiki_contracts::event::Severity;
use qiki_contracts::radar::{RadarTrack, RangeBand, TransponderMode};

/// Canonical rule ids.
pub mod rule_ids {
    /// SR contact without IFF inside the close threshold.
    pub const UNKNOWN_CONTACT_CLOSE: &str = "UNKNOWN_CONTACT_CLOSE";
    /// Transponder-off contact closing on ego.
    pub const FOE_TRANSPONDER_OFF_APPROACH: &str = "FOE_TRANSPONDER_OFF_APPROACH";
    /// Two tracks radiating the same identity.
    pub const SPOOFING_DETECTED: &str = "SPOOFING_DETECTED";
}

/// One configured rule. Thresholds live here and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRuleSpec {
    /// Rule identifier.
    pub id: String,
    /// Severity of alerts this rule emits.
    pub severity: Severity,
    /// Range threshold, metres, for range-bound rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_range_m: Option<f64>,
    /// Closing-speed threshold, m/s, for approach rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_closing_mps: Option<f64>,
    /// Whether the rule is evaluated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// The parsed rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRules {
    /// Suppression window for repeated `(rule, target)` firings, seconds.
    pub debounce_s: i64,
    /// The configured rules.
    pub rules: Vec<GuardRuleSpec>,
}

impl GuardRules {
    /// Parse a rule set from YAML.
    ///
    /// # Errors
    ///
    /// Returns the `serde_yaml` error when the document is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// One guard alert, as published on the guard alert subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardAlert {
    /// Always `"radar"`.
    pub category: String,
    /// Always `"guard_alert"`.
    pub kind: String,
    /// The rule that fired.
    pub rule_id: String,
    /// Alert severity.
    pub severity: Severity,
    /// The offending track.
    pub target_track_id: Uuid,
    /// Firing time.
    pub ts: DateTime<Utc>,
}

/// The guard rule engine.
#[derive(Debug)]
pub struct GuardEngine {
    rules: GuardRules,
    last_fired: HashMap<(String, String), DateTime<Utc>>,
}

impl GuardEngine {
    /// Create an engine over a parsed rule set.
    #[must_use]
    pub fn new(rules: GuardRules) -> Self {
        Self {
            rules,
            last_fired: HashMap::new(),
        }
    }

    /// Evaluate the track set. Returns only the alerts that pass debounce.
    pub fn evaluate(
        &mut self,
        tracks: &[RadarTrack],
        ego_pos: Vec3,
        now: DateTime<Utc>,
    ) -> Vec<GuardAlert> {
        let mut firings: Vec<(String, Severity, Uuid)> = Vec::new();

        for spec in &self.rules.rules {
            if !spec.enabled {
                continue;
            }
            match spec.id.as_str() {
                rule_ids::UNKNOWN_CONTACT_CLOSE => {
                    let threshold = spec.max_range_m.unwrap_or(f64::MAX);
                    for track in tracks {
                        if track.range_band == RangeBand::Sr
                            && !track.id_present
                            && range_to(track, ego_pos) < threshold
                        {
                            firings.push((spec.id.clone(), spec.severity, track.id));
                        }
                    }
                }
                rule_ids::FOE_TRANSPONDER_OFF_APPROACH => {
                    let min_closing = spec.min_closing_mps.unwrap_or(0.0);
                    let threshold = spec.max_range_m.unwrap_or(f64::MAX);
                    for track in tracks {
                        if track.transponder_mode == Some(TransponderMode::Off)
                            && closing_speed(track, ego_pos) > min_closing
                            && range_to(track, ego_pos) < threshold
                        {
                            firings.push((spec.id.clone(), spec.severity, track.id));
                        }
                    }
                }
                rule_ids::SPOOFING_DETECTED => {
                    firings.extend(
                        identity_collisions(tracks)
                            .into_iter()
                            .map(|id| (spec.id.clone(), spec.severity, id)),
                    );
                }
                other => {
                    debug!(rule_id = other, "unrecognised guard rule, skipping");
                }
            }
        }

        let debounce = Duration::seconds(self.rules.debounce_s);
        let mut alerts = Vec::new();
        for (rule_id, severity, track_id) in firings {
            let key = (rule_id.clone(), track_id.to_string());
            if let Some(last) = self.last_fired.get(&key)
                && now - *last < debounce
            {
                continue;
            }
            self.last_fired.insert(key, now);
            alerts.push(GuardAlert {
                category: "radar".to_string(),
                kind: "guard_alert".to_string(),
                rule_id,
                severity,
                target_track_id: track_id,
                ts: now,
            });
        }
        alerts
    }
}

fn range_to(track: &RadarTrack, ego_pos: Vec3) -> f64 {
    f64::from((track.pose.pos_m - ego_pos).length())
}

fn closing_speed(track: &RadarTrack, ego_pos: Vec3) -> f64 {
    let offset = track.pose.pos_m - ego_pos;
    if offset.length_squared() == 0.0 {
        return 0.0;
    }
    // Positive when closing: velocity projected against the line of sight.
    f64::from(-track.pose.vel_mps.dot(offset.normalize()))
}

/// Tracks whose transponder identity collides with another track's.
fn identity_collisions(tracks: &[RadarTrack]) -> Vec<Uuid> {
    let mut by_identity: HashMap<&str, Vec<Uuid>> = HashMap::new();
    for track in tracks {
        if let Some(id) = track.transponder_id.as_deref() {
            by_identity.entry(id).or_default().push(track.id);
        }
    }
    let mut colliding: Vec<Uuid> = by_identity
        .into_values()
        .filter(|ids| ids.len() > 1)
        .flatten()
        .collect();
    colliding.sort();
    colliding
}

#[cfg(test)]
mod tests {
    use qiki_contracts::radar::{TrackPose, TrackStatus};

    use super::*;

    fn rules() -> GuardRules {
        GuardRules::from_yaml(
            r"
debounce_s: 30
rules:
  - id: UNKNOWN_CONTACT_CLOSE
    severity: WARN
    max_range_m: 100.0
  - id: FOE_TRANSPONDER_OFF_APPROACH
    severity: ERROR
    max_range_m: 2000.0
    min_closing_mps: 1.0
  - id: SPOOFING_DETECTED
    severity: ERROR
",
        )
        .unwrap()
    }

    fn track(range_m: f32, band: RangeBand, id: Option<&str>) -> RadarTrack {
        RadarTrack {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            pose: TrackPose {
                pos_m: Vec3::new(range_m, 0.0, 0.0),
                vel_mps: Vec3::ZERO,
                euler_rad: Vec3::ZERO,
                omega_rps: Vec3::ZERO,
            },
            range_band: band,
            transponder_mode: None,
            transponder_id: id.map(str::to_string),
            id_present: id.is_some(),
            quality: 1.0,
            status: TrackStatus::Tracked,
        }
    }

    #[test]
    fn test_unknown_contact_close_fires() {
        let mut engine = GuardEngine::new(rules());
        let tracks = vec![track(60.0, RangeBand::Sr, None)];
        let alerts = engine.evaluate(&tracks, Vec3::ZERO, Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, rule_ids::UNKNOWN_CONTACT_CLOSE);
        assert_eq!(alerts[0].kind, "guard_alert");
    }

    #[test]
    fn test_identified_contact_does_not_fire() {
        let mut engine = GuardEngine::new(rules());
        let tracks = vec![track(60.0, RangeBand::Sr, Some("FRIEND-1"))];
        assert!(engine.evaluate(&tracks, Vec3::ZERO, Utc::now()).is_empty());
    }

    #[test]
    fn test_far_unknown_contact_does_not_fire() {
        let mut engine = GuardEngine::new(rules());
        let tracks = vec![track(150.0, RangeBand::Sr, None)];
        assert!(engine.evaluate(&tracks, Vec3::ZERO, Utc::now()).is_empty());
    }

    #[test]
    fn test_repeat_within_debounce_is_suppressed() {
        let mut engine = GuardEngine::new(rules());
        let tracks = vec![track(60.0, RangeBand::Sr, None)];
        let t0 = Utc::now();
        assert_eq!(engine.evaluate(&tracks, Vec3::ZERO, t0).len(), 1);
        let t1 = t0 + Duration::seconds(5);
        assert!(engine.evaluate(&tracks, Vec3::ZERO, t1).is_empty());
    }

    #[test]
    fn test_refires_after_debounce_expiry() {
        let mut engine = GuardEngine::new(rules());
        let tracks = vec![track(60.0, RangeBand::Sr, None)];
        let t0 = Utc::now();
        assert_eq!(engine.evaluate(&tracks, Vec3::ZERO, t0).len(), 1);
        let t1 = t0 + Duration::seconds(31);
        assert_eq!(engine.evaluate(&tracks, Vec3::ZERO, t1).len(), 1);
    }

    #[test]
    fn test_foe_transponder_off_approach() {
        let mut engine = GuardEngine::new(rules());
        let mut foe = track(500.0, RangeBand::Sr, None);
        foe.transponder_mode = Some(TransponderMode::Off);
        foe.pose.vel_mps = Vec3::new(-10.0, 0.0, 0.0); // closing
        let alerts = engine.evaluate(&[foe], Vec3::ZERO, Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, rule_ids::FOE_TRANSPONDER_OFF_APPROACH);
    }

    #[test]
    fn test_receding_foe_does_not_fire() {
        let mut engine = GuardEngine::new(rules());
        let mut foe = track(500.0, RangeBand::Sr, None);
        foe.transponder_mode = Some(TransponderMode::Off);
        foe.pose.vel_mps = Vec3::new(10.0, 0.0, 0.0); // receding
        assert!(engine.evaluate(&[foe], Vec3::ZERO, Utc::now()).is_empty());
    }

    #[test]
    fn test_spoofing_detected_on_identity_collision() {
        let mut engine = GuardEngine::new(rules());
        let a = track(60.0, RangeBand::Sr, Some("FRIEND-1"));
        let b = track(80.0, RangeBand::Sr, Some("FRIEND-1"));
        let alerts = engine.evaluate(&[a, b], Vec3::ZERO, Utc::now());
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.rule_id == rule_ids::SPOOFING_DETECTED));
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let mut rules = rules();
        for spec in &mut rules.rules {
            spec.enabled = false;
        }
        let mut engine = GuardEngine::new(rules);
        let tracks = vec![track(60.0, RangeBand::Sr, None)];
        assert!(engine.evaluate(&tracks, Vec3::ZERO, Utc::now()).is_empty());
    }
}
