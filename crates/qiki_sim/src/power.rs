//! Power system: loads, sources, SoC, and the canonical shedding order.
//!
//! The shedding policy is deterministic and tested as canonical:
//!
//! 1. SoC gate (hysteresis latch): shed `radar`, then `transponder`,
//!    reason `low_soc`.
//! 2. Thermal gate: core trip sheds `nbl` (`thermal_overheat`); pdu trip
//!    sheds `radar` and `transponder`.
//! 3. NBL gate: active but not allowed sheds `nbl` (`thermal_overheat`
//!    when trip-caused, else `nbl_budget`).
//! 4. PDU overcurrent: while over the limit, shed `nbl` → `radar` →
//!    `transponder`; then throttle `motion` → `rcs`; if still over, raise
//!    the `PDU_OVERCURRENT` fault.

use serde::{Deserialize, Serialize};

use qiki_contracts::telemetry::PowerTelemetry;

/// The raised fault name for an unresolvable overcurrent.
pub const FAULT_PDU_OVERCURRENT: &str = "PDU_OVERCURRENT";

/// Nominal draw per sheddable load, watts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Always-on avionics baseline.
    pub avionics_w: f64,
    /// Neutral-buoyancy lab package.
    pub nbl_w: f64,
    /// Radar.
    pub radar_w: f64,
    /// Transponder.
    pub transponder_w: f64,
    /// Main drive.
    pub motion_w: f64,
    /// Reaction control thrusters.
    pub rcs_w: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            avionics_w: 340.0,
            nbl_w: 40.0,
            radar_w: 30.0,
            transponder_w: 10.0,
            motion_w: 100.0,
            rcs_w: 80.0,
        }
    }
}

/// Static power system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Battery capacity, watt-hours.
    pub battery_capacity_wh: f64,
    /// Initial state of charge, percent.
    pub initial_soc_pct: f64,
    /// SoC shed entry threshold, percent.
    pub soc_low_pct: f64,
    /// SoC shed exit threshold, percent.
    pub soc_high_pct: f64,
    /// Bus voltage, volts.
    pub bus_v: f64,
    /// PDU current limit, amperes.
    pub max_a: f64,
    /// Source power (solar etc.), watts.
    pub sources_w: f64,
    /// Throttle factor applied to motion/rcs under overcurrent.
    pub throttle_factor: f64,
    /// Nominal loads.
    pub loads: LoadConfig,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            battery_capacity_wh: 2000.0,
            initial_soc_pct: 90.0,
            soc_low_pct: 20.0,
            soc_high_pct: 40.0,
            bus_v: 48.0,
            max_a: 20.0,
            sources_w: 400.0,
            throttle_factor: 0.5,
            loads: LoadConfig::default(),
        }
    }
}

/// Per-tick inputs to the power step.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerInputs {
    /// Core thermal node is tripped.
    pub core_tripped: bool,
    /// PDU thermal node is tripped.
    pub pdu_tripped: bool,
    /// NBL package is commanded on.
    pub nbl_active: bool,
    /// NBL duty budget has headroom.
    pub nbl_budget_ok: bool,
    /// Radar is commanded on.
    pub radar_on: bool,
    /// Transponder wants power (mode is not OFF).
    pub xpdr_wants_power: bool,
    /// Main drive is active.
    pub motion_active: bool,
    /// RCS burn in progress.
    pub rcs_active: bool,
}

/// Insertion-ordered shed list without duplicates.
#[derive(Debug, Default)]
struct ShedList {
    loads: Vec<String>,
    reasons: Vec<String>,
}

impl ShedList {
    fn add(&mut self, load: &str, reason: &str) {
        if !self.loads.iter().any(|l| l == load) {
            self.loads.push(load.to_string());
            self.reasons.push(reason.to_string());
        }
    }

    fn contains(&self, load: &str) -> bool {
        self.loads.iter().any(|l| l == load)
    }
}

/// The integrating power system.
#[derive(Debug)]
pub struct PowerSystem {
    config: PowerConfig,
    soc_pct: f64,
    soc_shed: bool,
}

impl PowerSystem {
    /// Build the system from its config.
    #[must_use]
    pub fn new(config: PowerConfig) -> Self {
        let soc_pct = config.initial_soc_pct;
        Self {
            config,
            soc_pct,
            soc_shed: false,
        }
    }

    /// Current state of charge, percent.
    #[must_use]
    pub fn soc_pct(&self) -> f64 {
        self.soc_pct
    }

    /// Whether the SoC shed latch is engaged.
    #[must_use]
    pub fn soc_shed(&self) -> bool {
        self.soc_shed
    }

    /// Force the state of charge (test and reset support).
    pub fn set_soc_pct(&mut self, soc_pct: f64) {
        self.soc_pct = soc_pct.clamp(0.0, 100.0);
    }

    /// One power step: apply gates, resolve overcurrent, integrate SoC.
    pub fn step(&mut self, inputs: &PowerInputs, dt: f64) -> PowerTelemetry {
        // SoC gate with hysteresis.
        if self.soc_pct <= self.config.soc_low_pct {
            self.soc_shed = true;
        } else if self.soc_pct >= self.config.soc_high_pct {
            self.soc_shed = false;
        }

        let mut shed = ShedList::default();
        if self.soc_shed {
            shed.add("radar", "low_soc");
            shed.add("transponder", "low_soc");
        }

        // Thermal gate.
        if inputs.core_tripped {
            shed.add("nbl", "thermal_overheat");
        }
        if inputs.pdu_tripped {
            shed.add("radar", "thermal_overheat");
            shed.add("transponder", "thermal_overheat");
        }

        // NBL gate.
        let nbl_allowed = !inputs.core_tripped && inputs.nbl_budget_ok;
        if inputs.nbl_active && !nbl_allowed {
            let reason = if inputs.core_tripped {
                "thermal_overheat"
            } else {
                "nbl_budget"
            };
            shed.add("nbl", reason);
        }

        // PDU overcurrent resolution.
        let limit_w = self.config.bus_v * self.config.max_a;
        let mut motion_factor = 1.0;
        let mut rcs_factor = 1.0;
        let mut pdu_throttled = false;
        let mut faults: Vec<String> = Vec::new();

        let mut power_out = self.total_load(inputs, &shed, motion_factor, rcs_factor);
        if power_out > limit_w {
            for load in ["nbl", "radar", "transponder"] {
                if self.draws(load, inputs) && !shed.contains(load) {
                    shed.add(load, "pdu_overcurrent");
                    power_out = self.total_load(inputs, &shed, motion_factor, rcs_factor);
                    if power_out <= limit_w {
                        break;
                    }
                }
            }
        }
        if power_out > limit_w && inputs.motion_active {
            motion_factor = self.config.throttle_factor;
            pdu_throttled = true;
            power_out = self.total_load(inputs, &shed, motion_factor, rcs_factor);
        }
        if power_out > limit_w && inputs.rcs_active {
            rcs_factor = self.config.throttle_factor;
            pdu_throttled = true;
            power_out = self.total_load(inputs, &shed, motion_factor, rcs_factor);
        }
        if power_out > limit_w {
            faults.push(FAULT_PDU_OVERCURRENT.to_string());
        }

        // Integrate SoC.
        let net_w = self.config.sources_w - power_out;
        let delta_pct = net_w * dt / (self.config.battery_capacity_wh * 3600.0) * 100.0;
        self.soc_pct = (self.soc_pct + delta_pct).clamp(0.0, 100.0);

        PowerTelemetry {
            soc_pct: self.soc_pct,
            loads_w: power_out,
            sources_w: self.config.sources_w,
            shed_loads: shed.loads,
            shed_reasons: shed.reasons,
            pdu_throttled,
            faults,
        }
    }

    /// Whether a sheddable load is currently drawing.
    fn draws(&self, load: &str, inputs: &PowerInputs) -> bool {
        match load {
            "nbl" => inputs.nbl_active,
            "radar" => inputs.radar_on,
            "transponder" => inputs.xpdr_wants_power,
            "motion" => inputs.motion_active,
            "rcs" => inputs.rcs_active,
            _ => false,
        }
    }

    fn total_load(
        &self,
        inputs: &PowerInputs,
        shed: &ShedList,
        motion_factor: f64,
        rcs_factor: f64,
    ) -> f64 {
        let loads = &self.config.loads;
        let mut total = loads.avionics_w;
        if inputs.nbl_active && !shed.contains("nbl") {
            total += loads.nbl_w;
        }
        if inputs.radar_on && !shed.contains("radar") {
            total += loads.radar_w;
        }
        if inputs.xpdr_wants_power && !shed.contains("transponder") {
            total += loads.transponder_w;
        }
        if inputs.motion_active {
            total += loads.motion_w * motion_factor;
        }
        if inputs.rcs_active {
            total += loads.rcs_w * rcs_factor;
        }
        total
    }
}
