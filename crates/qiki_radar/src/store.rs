//! The stateful track store.
//!
//! One store owns all active tracks for a scene. Per frame: predict every
//! track forward, associate detections by gated nearest neighbour, update
//! hits and misses, and advance the lifecycle. The store guarantees at most
//! one track per scene object at any time.

use std::collections::{HashMap, VecDeque};

use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

use qiki_contracts::radar::{
    RadarDetection, RadarFrame, RadarTrack, RangeBand, TrackPose, TrackStatus,
};

use crate::alpha_beta::{AlphaBeta, PolarState, wrap_pi};

/// Track store tuning.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Association gate on the range residual, metres.
    pub gate_range_m: f64,
    /// Association gate on the bearing residual, radians.
    pub gate_bearing_rad: f64,
    /// Consecutive hits to confirm `NEW → TRACKED`.
    pub confirm_hits: u32,
    /// Consecutive misses to retire a track.
    pub retire_misses: u32,
    /// Sliding window length for the quality ratio.
    pub quality_window: usize,
    /// Filter gains.
    pub filter: AlphaBeta,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            gate_range_m: 50.0,
            gate_bearing_rad: 0.2,
            confirm_hits: 3,
            retire_misses: 5,
            quality_window: 20,
            filter: AlphaBeta::default(),
        }
    }
}

/// Internal per-track state.
#[derive(Debug)]
struct TrackEntry {
    track: RadarTrack,
    state: PolarState,
    consecutive_hits: u32,
    consecutive_misses: u32,
    window: VecDeque<bool>,
}

impl TrackEntry {
    fn quality(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let hits = self.window.iter().filter(|hit| **hit).count();
        hits as f64 / self.window.len() as f64
    }

    fn push_observation(&mut self, hit: bool, window_len: usize) {
        self.window.push_back(hit);
        while self.window.len() > window_len {
            self.window.pop_front();
        }
        self.track.quality = self.quality();
    }
}

/// The track store for one radar scene.
#[derive(Debug)]
pub struct TrackStore {
    config: TrackConfig,
    /// Active tracks keyed by scene object id.
    tracks: HashMap<u64, TrackEntry>,
}

impl TrackStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: TrackConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
        }
    }

    /// Number of active tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the store has no active tracks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Process one frame and return the active track set in stable order.
    pub fn process_frame(&mut self, frame: &RadarFrame, dt: f64) -> Vec<RadarTrack> {
        // 1. Predict every active track forward.
        for entry in self.tracks.values_mut() {
            entry.state = self.config.filter.predict(entry.state, dt);
        }

        // 2. Associate detections. A detection whose scene object already
        //    has a track always belongs to that track; otherwise it must
        //    fall inside the gate of the nearest predicted track.
        let mut claimed: HashMap<u64, &RadarDetection> = HashMap::new();
        let mut spawners: Vec<&RadarDetection> = Vec::new();
        for detection in &frame.detections {
            if self.tracks.contains_key(&detection.scene_id) {
                claimed.entry(detection.scene_id).or_insert(detection);
            } else if let Some(scene_id) = self.gate_match(detection, &claimed) {
                claimed.entry(scene_id).or_insert(detection);
            } else {
                spawners.push(detection);
            }
        }

        // 3/4. Update hits and misses, advance lifecycles.
        let config = self.config.clone();
        let mut retired: Vec<u64> = Vec::new();
        for (scene_id, entry) in &mut self.tracks {
            if let Some(detection) = claimed.get(scene_id) {
                Self::apply_hit(&config, entry, detection, frame, dt);
            } else {
                entry.consecutive_hits = 0;
                entry.consecutive_misses += 1;
                entry.push_observation(false, config.quality_window);
                if entry.consecutive_misses >= config.retire_misses {
                    entry.track.status = TrackStatus::Lost;
                }
                if entry.consecutive_misses > config.retire_misses {
                    retired.push(*scene_id);
                }
            }
        }
        for scene_id in retired {
            if let Some(entry) = self.tracks.remove(&scene_id) {
                debug!(track_id = %entry.track.id, scene_id, "track retired");
            }
        }

        // 5. Spawn NEW tracks for unassociated detections.
        for detection in spawners {
            let entry = Self::spawn(&self.config, detection, frame);
            debug!(track_id = %entry.track.id, scene_id = detection.scene_id, "track spawned");
            self.tracks.insert(detection.scene_id, entry);
        }

        self.active_tracks()
    }

    /// The current active track set, ordered by scene id for stable output.
    #[must_use]
    pub fn active_tracks(&self) -> Vec<RadarTrack> {
        let mut scene_ids: Vec<u64> = self.tracks.keys().copied().collect();
        scene_ids.sort_unstable();
        scene_ids
            .iter()
            .map(|id| self.tracks[id].track.clone())
            .collect()
    }

    /// Find the nearest unclaimed track whose predicted state gates the
    /// detection. Returns its scene id.
    fn gate_match(
        &self,
        detection: &RadarDetection,
        claimed: &HashMap<u64, &RadarDetection>,
    ) -> Option<u64> {
        let mut best: Option<(u64, f64)> = None;
        for (scene_id, entry) in &self.tracks {
            if claimed.contains_key(scene_id) {
                continue;
            }
            let range_residual = (detection.range_m - entry.state.range_m).abs();
            let bearing_residual =
                wrap_pi(f64::from(detection.bearing_rad) - entry.state.bearing_rad).abs();
            if range_residual > self.config.gate_range_m
                || bearing_residual > self.config.gate_bearing_rad
            {
                continue;
            }
            let score = range_residual / self.config.gate_range_m
                + bearing_residual / self.config.gate_bearing_rad;
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((*scene_id, score));
            }
        }
        best.map(|(scene_id, _)| scene_id)
    }

    fn apply_hit(
        config: &TrackConfig,
        entry: &mut TrackEntry,
        detection: &RadarDetection,
        frame: &RadarFrame,
        dt: f64,
    ) {
        entry.state = config.filter.update(
            entry.state,
            detection.range_m,
            f64::from(detection.bearing_rad),
            None,
            dt,
        );
        entry.consecutive_misses = 0;
        entry.consecutive_hits += 1;
        entry.push_observation(true, config.quality_window);

        entry.track.ts = frame.ts;
        entry.track.pose = Self::pose_from(detection, &entry.state, frame);
        entry.track.range_band = detection.band;
        match detection.band {
            RangeBand::Sr => {
                entry.track.transponder_id = detection.transponder_id.clone();
                entry.track.id_present = detection.transponder_id.is_some();
            }
            RangeBand::Lr => {
                // Identity never survives in long range.
                entry.track.transponder_id = None;
                entry.track.transponder_mode = None;
                entry.track.id_present = false;
            }
        }

        if entry.track.status == TrackStatus::New && entry.consecutive_hits >= config.confirm_hits
        {
            entry.track.status = TrackStatus::Tracked;
        } else if entry.track.status == TrackStatus::Lost {
            entry.track.status = TrackStatus::Tracked;
        }
    }

    fn spawn(config: &TrackConfig, detection: &RadarDetection, frame: &RadarFrame) -> TrackEntry {
        let state = PolarState::at(detection.range_m, f64::from(detection.bearing_rad));
        let mut entry = TrackEntry {
            track: RadarTrack {
                id: Uuid::new_v4(),
                ts: frame.ts,
                pose: Self::pose_from(detection, &state, frame),
                range_band: detection.band,
                transponder_mode: None,
                transponder_id: if detection.band == RangeBand::Sr {
                    detection.transponder_id.clone()
                } else {
                    None
                },
                id_present: detection.band == RangeBand::Sr
                    && detection.transponder_id.is_some(),
                quality: 0.0,
                status: TrackStatus::New,
            },
            state,
            consecutive_hits: 1,
            consecutive_misses: 0,
            window: VecDeque::new(),
        };
        entry.push_observation(true, config.quality_window);
        entry
    }

    fn pose_from(detection: &RadarDetection, state: &PolarState, frame: &RadarFrame) -> TrackPose {
        let bearing = state.bearing_rad as f32;
        let elevation = detection.elevation_rad;
        let direction = Vec3::new(
            elevation.cos() * bearing.cos(),
            elevation.cos() * bearing.sin(),
            elevation.sin(),
        );
        TrackPose {
            pos_m: frame.ego.position_m + direction * state.range_m as f32,
            vel_mps: direction * state.range_rate_mps as f32,
            euler_rad: Vec3::new(0.0, elevation, bearing),
            omega_rps: Vec3::new(0.0, 0.0, state.bearing_rate_rps as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qiki_contracts::radar::EgoPose;

    use super::*;

    fn frame_with(detections: Vec<RadarDetection>) -> RadarFrame {
        RadarFrame {
            ts: Utc::now(),
            mono_ns: 0,
            ego: EgoPose::default(),
            detections,
        }
    }

    fn detection(scene_id: u64, range_m: f64, band: RangeBand, id: Option<&str>) -> RadarDetection {
        RadarDetection {
            bearing_rad: 0.1,
            elevation_rad: 0.0,
            range_m,
            snr_db: 15.0,
            band,
            scene_id,
            transponder_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_unassociated_detection_spawns_new_track() {
        let mut store = TrackStore::new(TrackConfig::default());
        let tracks = store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].status, TrackStatus::New);
    }

    #[test]
    fn test_track_confirms_after_m_hits() {
        let config = TrackConfig::default();
        let confirm = config.confirm_hits;
        let mut store = TrackStore::new(config);
        let mut last = Vec::new();
        for _ in 0..confirm {
            last = store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);
        }
        assert_eq!(last[0].status, TrackStatus::Tracked);
    }

    #[test]
    fn test_track_retires_after_k_misses() {
        let config = TrackConfig::default();
        let retire = config.retire_misses;
        let mut store = TrackStore::new(config);
        store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);

        let mut last = Vec::new();
        for _ in 0..retire {
            last = store.process_frame(&frame_with(vec![]), 0.1);
        }
        // At exactly K misses the track is published once as LOST.
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].status, TrackStatus::Lost);

        let after = store.process_frame(&frame_with(vec![]), 0.1);
        assert!(after.is_empty());
    }

    #[test]
    fn test_at_most_one_track_per_scene_object() {
        let mut store = TrackStore::new(TrackConfig::default());
        for _ in 0..5 {
            let tracks = store.process_frame(
                &frame_with(vec![detection(7, 80.0, RangeBand::Sr, None)]),
                0.1,
            );
            assert_eq!(tracks.len(), 1);
        }
    }

    #[test]
    fn test_quality_is_hit_ratio() {
        let mut store = TrackStore::new(TrackConfig::default());
        store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);
        store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);
        let tracks = store.process_frame(&frame_with(vec![]), 0.1);
        // Window holds hit, hit, miss.
        assert!((tracks[0].quality - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_lr_track_never_carries_identity() {
        let mut store = TrackStore::new(TrackConfig::default());
        // Identity on an LR detection would already be stripped upstream;
        // the store enforces the invariant independently.
        let rogue = RadarDetection {
            transponder_id: Some("LEAK".to_string()),
            ..detection(1, 5000.0, RangeBand::Lr, None)
        };
        let tracks = store.process_frame(&frame_with(vec![rogue]), 0.1);
        assert!(!tracks[0].id_present);
        assert!(tracks[0].transponder_id.is_none());
    }

    #[test]
    fn test_track_id_is_stable_across_frames() {
        let mut store = TrackStore::new(TrackConfig::default());
        let first = store.process_frame(&frame_with(vec![detection(1, 80.0, RangeBand::Sr, None)]), 0.1);
        let second = store.process_frame(&frame_with(vec![detection(1, 79.0, RangeBand::Sr, None)]), 0.1);
        assert_eq!(first[0].id, second[0].id);
    }
}
