//! Simulation configuration.
//!
//! Read once at process start from YAML plus environment overrides and
//! resolved into an immutable struct. There is no hot reload; runtime
//! changes go through explicit bus commands.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use qiki_contracts::radar::TransponderMode;
use qiki_radar::GuardRules;

use crate::power::PowerConfig;
use crate::scene::SceneConfig;
use crate::sensors::SensorConfig;
use crate::thermal::ThermalConfig;

/// The default guard rule document shipped with the repo. Thresholds live
/// there and nowhere else.
pub const DEFAULT_GUARD_RULES: &str = include_str!("../../../config/guard_rules.yaml");

/// Environment variable overriding the tick period, milliseconds.
pub const TICK_PERIOD_ENV: &str = "QIKI_SIM_TICK_MS";

/// Environment variable overriding the point-probe host.
pub const PROBE_HOST_ENV: &str = "GRPC_HOST";

/// Environment variable overriding the point-probe port.
pub const PROBE_PORT_ENV: &str = "GRPC_PORT";

/// Configuration loading failure. Fatal at boot; exit code 2.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The document does not match the schema.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Service name stamped into telemetry and events.
    pub source: String,
    /// Tick period, milliseconds.
    pub tick_period_ms: u64,
    /// SR/LR range threshold, metres.
    pub sr_threshold_m: f64,
    /// Identity the transponder radiates when ON.
    pub xpdr_id: String,
    /// Transponder mode at boot.
    pub initial_xpdr_mode: TransponderMode,
    /// Whether the NBL package is commanded on at boot.
    pub nbl_active: bool,
    /// Whether the NBL duty budget has headroom.
    pub nbl_budget_ok: bool,
    /// Baseline heat dissipation per thermal node, watts.
    pub heat_w: HashMap<String, f64>,
    /// RCS angular authority at full duty, rad/s.
    pub rcs_authority_rps: f32,
    /// Default docking port.
    pub dock_default_port: String,
    /// HTTP point-probe bind address.
    pub probe_addr: String,
    /// Thermal network.
    pub thermal: ThermalConfig,
    /// Power system.
    pub power: PowerConfig,
    /// Sensor plane.
    pub sensors: SensorConfig,
    /// Radar scene.
    pub scene: SceneConfig,
    /// Guard rules (parsed from the canonical YAML).
    pub guard: GuardRules,
    /// Hardware profile, hashed into telemetry.
    pub hardware_profile: Value,
    /// Hardware manifest, hashed into telemetry.
    pub hardware_manifest: Value,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut heat_w = HashMap::new();
        heat_w.insert("core".to_string(), 30.0);
        heat_w.insert("pdu".to_string(), 15.0);
        Self {
            source: "q-sim".to_string(),
            tick_period_ms: 100,
            sr_threshold_m: 100.0,
            xpdr_id: "QIKI-01".to_string(),
            initial_xpdr_mode: TransponderMode::On,
            nbl_active: true,
            nbl_budget_ok: true,
            heat_w,
            rcs_authority_rps: 0.1,
            dock_default_port: "port_a".to_string(),
            probe_addr: "127.0.0.1:8081".to_string(),
            thermal: ThermalConfig::default(),
            power: PowerConfig::default(),
            sensors: SensorConfig::default(),
            scene: SceneConfig::default(),
            guard: GuardRules::from_yaml(DEFAULT_GUARD_RULES)
                .unwrap_or(GuardRules {
                    debounce_s: 30,
                    rules: Vec::new(),
                }),
            hardware_profile: json!({"model": "qiki-craft", "revision": 1}),
            hardware_manifest: json!({"devices": ["imu0", "radar0", "xpdr0"]}),
        }
    }
}

impl SimConfig {
    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read or parse failure.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Fold recognised environment variables into the config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(TICK_PERIOD_ENV)
            && let Ok(ms) = value.parse::<u64>()
        {
            self.tick_period_ms = ms;
        }
        if let Ok(port) = std::env::var(PROBE_PORT_ENV)
            && port.parse::<u16>().is_ok()
        {
            let host = std::env::var(PROBE_HOST_ENV)
                .unwrap_or_else(|_| "127.0.0.1".to_string());
            self.probe_addr = format!("{host}:{port}");
        }
    }

    /// The tick period as seconds.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.tick_period_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parses_shipped_guard_rules() {
        let config = SimConfig::default();
        assert!(!config.guard.rules.is_empty());
        assert_eq!(config.guard.debounce_s, 30);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = SimConfig::from_yaml_str("tick_period_ms: 50\n").unwrap();
        assert_eq!(config.tick_period_ms, 50);
        assert_eq!(config.source, "q-sim");
    }

    #[test]
    fn test_malformed_yaml_is_a_config_error() {
        let result = SimConfig::from_yaml_str("tick_period_ms: [not a number");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_dt_converts_millis() {
        let config = SimConfig::default();
        assert!((config.dt() - 0.1).abs() < 1e-9);
    }
}
