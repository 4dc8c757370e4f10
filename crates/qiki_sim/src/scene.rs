//! The radar scene.
//!
//! Contacts move on straight-line trajectories; measurement noise comes
//! from a seeded RNG so a given seed replays the identical frame sequence.
//! Frames leave this module already band-classified and LR-sanitised.

use chrono::Utc;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use qiki_contracts::ids::mono_ns;
use qiki_contracts::radar::{EgoPose, RadarDetection, RadarFrame, RangeBand};
use qiki_radar::band;

/// One configured scene contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Stable scene object id.
    pub scene_id: u64,
    /// Initial position, metres.
    pub position_m: [f32; 3],
    /// Velocity, m/s.
    pub velocity_mps: [f32; 3],
    /// Transponder identity the contact radiates, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transponder_id: Option<String>,
}

/// Static scene configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfig {
    /// RNG seed for measurement noise.
    #[serde(default)]
    pub seed: u64,
    /// Range noise standard bound, metres.
    #[serde(default = "default_range_noise")]
    pub range_noise_m: f64,
    /// Configured contacts.
    #[serde(default)]
    pub contacts: Vec<ContactConfig>,
}

fn default_range_noise() -> f64 {
    0.5
}

#[derive(Debug)]
struct Contact {
    scene_id: u64,
    position_m: Vec3,
    velocity_mps: Vec3,
    transponder_id: Option<String>,
}

/// The stepping radar scene.
#[derive(Debug)]
pub struct RadarScene {
    rng: StdRng,
    range_noise_m: f64,
    contacts: Vec<Contact>,
    initial: SceneConfig,
}

impl RadarScene {
    /// Build the scene from its config.
    #[must_use]
    pub fn new(config: SceneConfig) -> Self {
        let contacts = Self::contacts_from(&config);
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            range_noise_m: config.range_noise_m,
            contacts,
            initial: config,
        }
    }

    fn contacts_from(config: &SceneConfig) -> Vec<Contact> {
        config
            .contacts
            .iter()
            .map(|c| Contact {
                scene_id: c.scene_id,
                position_m: Vec3::from_array(c.position_m),
                velocity_mps: Vec3::from_array(c.velocity_mps),
                transponder_id: c.transponder_id.clone(),
            })
            .collect()
    }

    /// Restore the initial contact set and reseed the RNG.
    pub fn reset(&mut self) {
        self.contacts = Self::contacts_from(&self.initial);
        self.rng = StdRng::seed_from_u64(self.initial.seed);
    }

    /// Advance contact trajectories.
    pub fn step(&mut self, dt: f64) {
        for contact in &mut self.contacts {
            contact.position_m += contact.velocity_mps * dt as f32;
        }
    }

    /// Produce one sanitised frame as seen from `ego`.
    pub fn frame(&mut self, ego: EgoPose, sr_threshold_m: f64) -> RadarFrame {
        let mut detections = Vec::with_capacity(self.contacts.len());
        for contact in &self.contacts {
            let offset = contact.position_m - ego.position_m;
            let true_range = f64::from(offset.length());
            let noise = self.rng.gen_range(-self.range_noise_m..=self.range_noise_m);
            let range_m = (true_range + noise).max(0.0);
            let bearing_rad = offset.y.atan2(offset.x);
            let horizontal = (offset.x * offset.x + offset.y * offset.y).sqrt();
            let elevation_rad = offset.z.atan2(horizontal);

            detections.push(RadarDetection {
                bearing_rad,
                elevation_rad,
                range_m,
                snr_db: 10.0 + self.rng.gen_range(0.0..5.0),
                band: RangeBand::Sr, // re-banded by the sanitiser below
                scene_id: contact.scene_id,
                transponder_id: contact.transponder_id.clone(),
            });
        }

        let mut frame = RadarFrame {
            ts: Utc::now(),
            mono_ns: mono_ns(),
            ego,
            detections,
        };
        band::sanitize_frame(&mut frame, sr_threshold_m);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SceneConfig {
        SceneConfig {
            seed: 7,
            range_noise_m: 0.0,
            contacts: vec![
                ContactConfig {
                    scene_id: 1,
                    position_m: [60.0, 0.0, 0.0],
                    velocity_mps: [0.0, 0.0, 0.0],
                    transponder_id: None,
                },
                ContactConfig {
                    scene_id: 2,
                    position_m: [5000.0, 0.0, 0.0],
                    velocity_mps: [-10.0, 0.0, 0.0],
                    transponder_id: Some("FRIEND-9".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_frame_bands_by_threshold() {
        let mut scene = RadarScene::new(config());
        let frame = scene.frame(EgoPose::default(), 100.0);
        let near = frame.detections.iter().find(|d| d.scene_id == 1).unwrap();
        let far = frame.detections.iter().find(|d| d.scene_id == 2).unwrap();
        assert_eq!(near.band, RangeBand::Sr);
        assert_eq!(far.band, RangeBand::Lr);
    }

    #[test]
    fn test_lr_contact_loses_identity_in_frame() {
        let mut scene = RadarScene::new(config());
        let frame = scene.frame(EgoPose::default(), 100.0);
        let far = frame.detections.iter().find(|d| d.scene_id == 2).unwrap();
        assert!(far.transponder_id.is_none());
    }

    #[test]
    fn test_contacts_move() {
        let mut scene = RadarScene::new(config());
        scene.step(10.0);
        let frame = scene.frame(EgoPose::default(), 100.0);
        let far = frame.detections.iter().find(|d| d.scene_id == 2).unwrap();
        assert!((far.range_m - 4900.0).abs() < 1.0);
    }

    #[test]
    fn test_same_seed_replays_same_ranges() {
        let noisy = SceneConfig {
            range_noise_m: 2.0,
            ..config()
        };
        let mut a = RadarScene::new(noisy.clone());
        let mut b = RadarScene::new(noisy);
        let fa = a.frame(EgoPose::default(), 100.0);
        let fb = b.frame(EgoPose::default(), 100.0);
        for (da, db) in fa.detections.iter().zip(&fb.detections) {
            assert!((da.range_m - db.range_m).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_reset_restores_initial_positions() {
        let mut scene = RadarScene::new(config());
        scene.step(100.0);
        scene.reset();
        let frame = scene.frame(EgoPose::default(), 100.0);
        let near = frame.detections.iter().find(|d| d.scene_id == 1).unwrap();
        assert!((near.range_m - 60.0).abs() < 1.0);
    }
}
