//! Docking state machine.
//!
//! `idle → engaging → engaged → releasing → idle`, driven by accepted
//! commands and advanced by tick time. Commands that do not fit the
//! current state are refused with a kind the caller can surface.

use qiki_contracts::telemetry::DockingTelemetry;

/// Seconds to complete an engage or release manoeuvre.
const TRANSIT_S: f64 = 2.0;

/// Docking state.
#[derive(Debug, Clone, PartialEq)]
pub enum DockingState {
    /// No docking activity.
    Idle,
    /// Approaching a port.
    Engaging {
        /// Target port.
        port: String,
        /// Seconds remaining.
        remaining_s: f64,
    },
    /// Hard-docked.
    Engaged {
        /// Engaged port.
        port: String,
    },
    /// Backing away.
    Releasing {
        /// Seconds remaining.
        remaining_s: f64,
    },
}

/// A refused docking command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DockingError {
    /// Engage while not idle.
    #[error("dock_busy")]
    Busy,
    /// Release while not engaged.
    #[error("not_docked")]
    NotDocked,
}

/// The docking bay.
#[derive(Debug)]
pub struct DockingBay {
    state: DockingState,
    default_port: String,
}

impl DockingBay {
    /// An idle bay with the given default port.
    #[must_use]
    pub fn new(default_port: &str) -> Self {
        Self {
            state: DockingState::Idle,
            default_port: default_port.to_string(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &DockingState {
        &self.state
    }

    /// Begin engaging a port (the default when `port` is `None`).
    ///
    /// # Errors
    ///
    /// Returns [`DockingError::Busy`] unless the bay is idle.
    pub fn engage(&mut self, port: Option<&str>) -> Result<(), DockingError> {
        if self.state != DockingState::Idle {
            return Err(DockingError::Busy);
        }
        self.state = DockingState::Engaging {
            port: port.unwrap_or(&self.default_port).to_string(),
            remaining_s: TRANSIT_S,
        };
        Ok(())
    }

    /// Begin releasing.
    ///
    /// # Errors
    ///
    /// Returns [`DockingError::NotDocked`] unless the bay is engaged.
    pub fn release(&mut self) -> Result<(), DockingError> {
        match &self.state {
            DockingState::Engaged { .. } => {
                self.state = DockingState::Releasing {
                    remaining_s: TRANSIT_S,
                };
                Ok(())
            }
            _ => Err(DockingError::NotDocked),
        }
    }

    /// Reset to idle (sim reset support).
    pub fn reset(&mut self) {
        self.state = DockingState::Idle;
    }

    /// Advance transit timers.
    pub fn step(&mut self, dt: f64) {
        self.state = match std::mem::replace(&mut self.state, DockingState::Idle) {
            DockingState::Engaging { port, remaining_s } => {
                let remaining = remaining_s - dt;
                if remaining <= 0.0 {
                    DockingState::Engaged { port }
                } else {
                    DockingState::Engaging {
                        port,
                        remaining_s: remaining,
                    }
                }
            }
            DockingState::Releasing { remaining_s } => {
                let remaining = remaining_s - dt;
                if remaining <= 0.0 {
                    DockingState::Idle
                } else {
                    DockingState::Releasing {
                        remaining_s: remaining,
                    }
                }
            }
            other => other,
        };
    }

    /// The telemetry view of the current state.
    #[must_use]
    pub fn telemetry(&self) -> DockingTelemetry {
        match &self.state {
            DockingState::Idle => DockingTelemetry {
                state: "idle".to_string(),
                port: None,
                connected: false,
            },
            DockingState::Engaging { port, .. } => DockingTelemetry {
                state: "engaging".to_string(),
                port: Some(port.clone()),
                connected: false,
            },
            DockingState::Engaged { port } => DockingTelemetry {
                state: "engaged".to_string(),
                port: Some(port.clone()),
                connected: true,
            },
            DockingState::Releasing { .. } => DockingTelemetry {
                state: "releasing".to_string(),
                port: None,
                connected: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_completes_after_transit() {
        let mut bay = DockingBay::new("port_a");
        bay.engage(None).unwrap();
        bay.step(TRANSIT_S + 0.1);
        assert!(matches!(bay.state(), DockingState::Engaged { .. }));
        assert!(bay.telemetry().connected);
        assert_eq!(bay.telemetry().port.as_deref(), Some("port_a"));
    }

    #[test]
    fn test_engage_explicit_port() {
        let mut bay = DockingBay::new("port_a");
        bay.engage(Some("port_b")).unwrap();
        bay.step(TRANSIT_S);
        assert_eq!(bay.telemetry().port.as_deref(), Some("port_b"));
    }

    #[test]
    fn test_engage_while_busy_is_refused() {
        let mut bay = DockingBay::new("port_a");
        bay.engage(None).unwrap();
        assert_eq!(bay.engage(None), Err(DockingError::Busy));
    }

    #[test]
    fn test_release_requires_engaged() {
        let mut bay = DockingBay::new("port_a");
        assert_eq!(bay.release(), Err(DockingError::NotDocked));
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let mut bay = DockingBay::new("port_a");
        bay.engage(None).unwrap();
        bay.step(TRANSIT_S);
        bay.release().unwrap();
        bay.step(TRANSIT_S);
        assert_eq!(*bay.state(), DockingState::Idle);
        assert!(!bay.telemetry().connected);
    }
}
