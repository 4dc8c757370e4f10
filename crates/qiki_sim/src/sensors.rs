//! Sensor plane.
//!
//! Disabled sensors contribute absent keys to the snapshot — the consumer
//! sees `null`-free JSON with the key missing, never a fabricated zero.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use qiki_contracts::telemetry::{ImuReading, SensorPlane};

/// Static sensor plane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Whether the IMU is fitted and enabled.
    pub imu_enabled: bool,
    /// Whether the dosimeter is fitted and enabled.
    pub dosimeter_enabled: bool,
    /// Ambient radiation rate, µSv/h.
    pub radiation_usvh: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            imu_enabled: true,
            dosimeter_enabled: true,
            radiation_usvh: 0.12,
        }
    }
}

/// The stepping sensor plane.
#[derive(Debug)]
pub struct SensorPlaneSim {
    config: SensorConfig,
    dose_usv: f64,
}

impl SensorPlaneSim {
    /// Build the plane from its config.
    #[must_use]
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            dose_usv: 0.0,
        }
    }

    /// Radiation rate, when the dosimeter is enabled.
    #[must_use]
    pub fn radiation_usvh(&self) -> Option<f64> {
        self.config
            .dosimeter_enabled
            .then_some(self.config.radiation_usvh)
    }

    /// Step the plane: integrate dose and sample the IMU.
    pub fn step(&mut self, omega_rps: Vec3, accel_mps2: Vec3, dt: f64) -> SensorPlane {
        if self.config.dosimeter_enabled {
            // Dose is the time integral of the rate.
            self.dose_usv += self.config.radiation_usvh * dt / 3600.0;
        }
        SensorPlane {
            imu: self.config.imu_enabled.then_some(ImuReading {
                gyro_rps: omega_rps,
                accel_mps2,
            }),
            radiation_dose_usv: self.config.dosimeter_enabled.then_some(self.dose_usv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_integrates_rate() {
        let mut plane = SensorPlaneSim::new(SensorConfig {
            radiation_usvh: 3600.0,
            ..SensorConfig::default()
        });
        let reading = plane.step(Vec3::ZERO, Vec3::ZERO, 1.0);
        assert!((reading.radiation_dose_usv.unwrap() - 1.0).abs() < 1e-9);
        let reading = plane.step(Vec3::ZERO, Vec3::ZERO, 1.0);
        assert!((reading.radiation_dose_usv.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_dosimeter_emits_nothing() {
        let mut plane = SensorPlaneSim::new(SensorConfig {
            dosimeter_enabled: false,
            ..SensorConfig::default()
        });
        let reading = plane.step(Vec3::ZERO, Vec3::ZERO, 1.0);
        assert!(reading.radiation_dose_usv.is_none());
        assert!(plane.radiation_usvh().is_none());
    }

    #[test]
    fn test_disabled_imu_emits_nothing() {
        let mut plane = SensorPlaneSim::new(SensorConfig {
            imu_enabled: false,
            ..SensorConfig::default()
        });
        let reading = plane.step(Vec3::ONE, Vec3::ONE, 1.0);
        assert!(reading.imu.is_none());
    }

    #[test]
    fn test_enabled_imu_reports_rates() {
        let mut plane = SensorPlaneSim::new(SensorConfig::default());
        let reading = plane.step(Vec3::new(0.0, 0.0, 0.2), Vec3::ZERO, 1.0);
        assert_eq!(reading.imu.unwrap().gyro_rps, Vec3::new(0.0, 0.0, 0.2));
    }
}
