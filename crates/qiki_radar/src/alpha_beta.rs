//! α-β filter over polar track state.
//!
//! The filter tracks range and bearing with their rates. When a detection
//! carries doppler the measured rate replaces the residual-derived one for
//! the range channel.

/// Polar kinematic state of one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarState {
    /// Slant range, metres.
    pub range_m: f64,
    /// Range rate, m/s.
    pub range_rate_mps: f64,
    /// Bearing, radians.
    pub bearing_rad: f64,
    /// Bearing rate, rad/s.
    pub bearing_rate_rps: f64,
}

impl PolarState {
    /// A stationary state at the given position.
    #[must_use]
    pub fn at(range_m: f64, bearing_rad: f64) -> Self {
        Self {
            range_m,
            range_rate_mps: 0.0,
            bearing_rad,
            bearing_rate_rps: 0.0,
        }
    }
}

/// α-β filter gains.
#[derive(Debug, Clone, Copy)]
pub struct AlphaBeta {
    /// Position gain.
    pub alpha: f64,
    /// Rate gain.
    pub beta: f64,
}

impl Default for AlphaBeta {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.2,
        }
    }
}

impl AlphaBeta {
    /// Predict the state forward by `dt` seconds.
    #[must_use]
    pub fn predict(self, state: PolarState, dt: f64) -> PolarState {
        PolarState {
            range_m: state.range_m + state.range_rate_mps * dt,
            range_rate_mps: state.range_rate_mps,
            bearing_rad: state.bearing_rad + state.bearing_rate_rps * dt,
            bearing_rate_rps: state.bearing_rate_rps,
        }
    }

    /// Correct a predicted state with a measurement.
    ///
    /// `doppler_mps`, when present, overrides the residual-derived range
    /// rate.
    #[must_use]
    pub fn update(
        self,
        predicted: PolarState,
        range_m: f64,
        bearing_rad: f64,
        doppler_mps: Option<f64>,
        dt: f64,
    ) -> PolarState {
        let range_residual = range_m - predicted.range_m;
        let bearing_residual = wrap_pi(bearing_rad - predicted.bearing_rad);
        let dt = dt.max(1e-6);

        let range_rate = doppler_mps
            .unwrap_or(predicted.range_rate_mps + self.beta * range_residual / dt);

        PolarState {
            range_m: predicted.range_m + self.alpha * range_residual,
            range_rate_mps: range_rate,
            bearing_rad: wrap_pi(predicted.bearing_rad + self.alpha * bearing_residual),
            bearing_rate_rps: predicted.bearing_rate_rps + self.beta * bearing_residual / dt,
        }
    }
}

/// Wrap an angle into `(-π, π]`.
#[must_use]
pub fn wrap_pi(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = angle % two_pi;
    if a > std::f64::consts::PI {
        a -= two_pi;
    } else if a <= -std::f64::consts::PI {
        a += two_pi;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_advances_range() {
        let filter = AlphaBeta::default();
        let state = PolarState {
            range_m: 100.0,
            range_rate_mps: -10.0,
            bearing_rad: 0.0,
            bearing_rate_rps: 0.0,
        };
        let predicted = filter.predict(state, 1.0);
        assert!((predicted.range_m - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let filter = AlphaBeta::default();
        let predicted = PolarState::at(100.0, 0.0);
        let updated = filter.update(predicted, 110.0, 0.0, None, 1.0);
        assert!(updated.range_m > 100.0);
        assert!(updated.range_m < 110.0);
    }

    #[test]
    fn test_doppler_overrides_range_rate() {
        let filter = AlphaBeta::default();
        let predicted = PolarState::at(100.0, 0.0);
        let updated = filter.update(predicted, 100.0, 0.0, Some(-25.0), 1.0);
        assert!((updated.range_rate_mps - -25.0).abs() < 1e-9);
    }

    #[test]
    fn test_converges_on_constant_velocity_target() {
        let filter = AlphaBeta::default();
        let mut state = PolarState::at(1000.0, 0.0);
        // Target closes at 5 m/s; feed ten 1 Hz measurements.
        for step in 1..=10 {
            let truth = 1000.0 - 5.0 * f64::from(step);
            state = filter.predict(state, 1.0);
            state = filter.update(state, truth, 0.0, None, 1.0);
        }
        assert!((state.range_m - 950.0).abs() < 5.0);
        assert!((state.range_rate_mps - -5.0).abs() < 2.0);
    }

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(3.0 * std::f64::consts::PI) - std::f64::consts::PI).abs() < 1e-9);
        assert!(wrap_pi(-4.0 * std::f64::consts::PI).abs() < 1e-9);
    }
}
