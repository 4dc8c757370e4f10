//! Lumped-node thermal network.
//!
//! Explicit Euler integration of
//! `dT_i/dt = (Q_i − cooling_i·(T_i−T_amb) − Σ_k k_ik·(T_i−T_k)) / C_i`
//! with per-node hysteresis trips: a node trips at `t_trip` and clears at
//! `t_trip − hysteresis`, so a temperature hovering near the threshold
//! cannot chatter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use qiki_contracts::telemetry::ThermalNodeReading;

/// Static description of one thermal node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalNodeConfig {
    /// Node identifier (e.g. `"core"`, `"pdu"`).
    pub id: String,
    /// Heat capacity `C_i`, J/K.
    pub heat_capacity_j_k: f64,
    /// Cooling coefficient to ambient, W/K.
    pub cooling_w_k: f64,
    /// Trip threshold, °C.
    pub t_trip_c: f64,
    /// Hysteresis below the trip threshold, °C.
    pub hysteresis_c: f64,
    /// Initial temperature, °C.
    pub initial_c: f64,
}

/// A conductive coupling between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// First node id.
    pub a: String,
    /// Second node id.
    pub b: String,
    /// Conductance `k`, W/K.
    pub k_w_k: f64,
}

/// Static description of the whole network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// Ambient temperature, °C.
    pub ambient_c: f64,
    /// All nodes.
    pub nodes: Vec<ThermalNodeConfig>,
    /// All couplings.
    #[serde(default)]
    pub couplings: Vec<CouplingConfig>,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            ambient_c: 25.0,
            nodes: vec![
                ThermalNodeConfig {
                    id: "core".to_string(),
                    heat_capacity_j_k: 800.0,
                    cooling_w_k: 0.8,
                    t_trip_c: 90.0,
                    hysteresis_c: 5.0,
                    initial_c: 25.0,
                },
                ThermalNodeConfig {
                    id: "pdu".to_string(),
                    heat_capacity_j_k: 400.0,
                    cooling_w_k: 0.6,
                    t_trip_c: 80.0,
                    hysteresis_c: 5.0,
                    initial_c: 25.0,
                },
            ],
            couplings: vec![CouplingConfig {
                a: "core".to_string(),
                b: "pdu".to_string(),
                k_w_k: 0.2,
            }],
        }
    }
}

/// A trip edge: emitted once when a node crosses its threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripEdge {
    /// The node that crossed.
    pub node: String,
    /// True on trip, false on clear.
    pub tripped: bool,
}

#[derive(Debug)]
struct NodeState {
    config: ThermalNodeConfig,
    temp_c: f64,
    tripped: bool,
}

/// The integrating thermal network.
#[derive(Debug)]
pub struct ThermalNetwork {
    ambient_c: f64,
    nodes: Vec<NodeState>,
    couplings: Vec<(usize, usize, f64)>,
}

impl ThermalNetwork {
    /// Build the network from its config.
    #[must_use]
    pub fn new(config: &ThermalConfig) -> Self {
        let nodes: Vec<NodeState> = config
            .nodes
            .iter()
            .map(|node| NodeState {
                config: node.clone(),
                temp_c: node.initial_c,
                tripped: false,
            })
            .collect();
        let index: HashMap<&str, usize> = config
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();
        let couplings = config
            .couplings
            .iter()
            .filter_map(|c| {
                let a = *index.get(c.a.as_str())?;
                let b = *index.get(c.b.as_str())?;
                Some((a, b, c.k_w_k))
            })
            .collect();
        Self {
            ambient_c: config.ambient_c,
            nodes,
            couplings,
        }
    }

    /// One Euler step. `heat_w` maps node id → dissipated power `Q_i`.
    /// Returns trip edges that occurred during the step.
    pub fn step(&mut self, heat_w: &HashMap<String, f64>, dt: f64) -> Vec<TripEdge> {
        // Exchange terms from the pre-step temperatures.
        let mut exchange = vec![0.0f64; self.nodes.len()];
        for &(a, b, k) in &self.couplings {
            let flow = k * (self.nodes[a].temp_c - self.nodes[b].temp_c);
            exchange[a] -= flow;
            exchange[b] += flow;
        }

        let mut edges = Vec::new();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let q = heat_w.get(&node.config.id).copied().unwrap_or(0.0);
            let cooling = node.config.cooling_w_k * (node.temp_c - self.ambient_c);
            let dtemp = (q - cooling + exchange[i]) / node.config.heat_capacity_j_k;
            node.temp_c += dtemp * dt;

            let clear_at = node.config.t_trip_c - node.config.hysteresis_c;
            if !node.tripped && node.temp_c >= node.config.t_trip_c {
                node.tripped = true;
                edges.push(TripEdge {
                    node: node.config.id.clone(),
                    tripped: true,
                });
            } else if node.tripped && node.temp_c <= clear_at {
                node.tripped = false;
                edges.push(TripEdge {
                    node: node.config.id.clone(),
                    tripped: false,
                });
            }
        }
        edges
    }

    /// Whether a node is currently tripped. Unknown nodes are not tripped.
    #[must_use]
    pub fn is_tripped(&self, id: &str) -> bool {
        self.nodes
            .iter()
            .any(|node| node.config.id == id && node.tripped)
    }

    /// Temperature of a node, if it exists.
    #[must_use]
    pub fn temp_c(&self, id: &str) -> Option<f64> {
        self.nodes
            .iter()
            .find(|node| node.config.id == id)
            .map(|node| node.temp_c)
    }

    /// Current readings for the telemetry snapshot.
    #[must_use]
    pub fn readings(&self) -> Vec<ThermalNodeReading> {
        self.nodes
            .iter()
            .map(|node| ThermalNodeReading {
                id: node.config.id.clone(),
                temp_c: node.temp_c,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heat(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_node_heats_under_load() {
        let mut network = ThermalNetwork::new(&ThermalConfig::default());
        let before = network.temp_c("core").unwrap();
        network.step(&heat(&[("core", 500.0)]), 1.0);
        assert!(network.temp_c("core").unwrap() > before);
    }

    #[test]
    fn test_node_cools_toward_ambient() {
        let config = ThermalConfig {
            nodes: vec![ThermalNodeConfig {
                initial_c: 80.0,
                ..ThermalConfig::default().nodes[0].clone()
            }],
            couplings: vec![],
            ..ThermalConfig::default()
        };
        let mut network = ThermalNetwork::new(&config);
        network.step(&heat(&[]), 10.0);
        let temp = network.temp_c("core").unwrap();
        assert!(temp < 80.0);
        assert!(temp > config.ambient_c);
    }

    #[test]
    fn test_trip_fires_once_with_hysteresis() {
        // core: t_trip 90, hysteresis 5, C 800, cooling 0.8, ambient 25.
        let mut network = ThermalNetwork::new(&ThermalConfig::default());
        let mut trip_edges = 0;
        // Drive with 2 kW until trip.
        for _ in 0..600 {
            for edge in network.step(&heat(&[("core", 2000.0)]), 1.0) {
                if edge.node == "core" && edge.tripped {
                    trip_edges += 1;
                }
            }
            if network.is_tripped("core") {
                break;
            }
        }
        assert_eq!(trip_edges, 1);
        assert!(network.is_tripped("core"));

        // Staying hot does not re-emit the edge.
        let edges = network.step(&heat(&[("core", 2000.0)]), 1.0);
        assert!(edges.iter().all(|e| !(e.node == "core" && e.tripped)));
    }

    #[test]
    fn test_clear_requires_cooling_below_hysteresis_band() {
        let mut network = ThermalNetwork::new(&ThermalConfig::default());
        // Heat to trip.
        while !network.is_tripped("core") {
            network.step(&heat(&[("core", 2000.0)]), 1.0);
        }
        // Cool; the clear edge arrives only below 85 °C.
        let mut cleared = false;
        for _ in 0..10_000 {
            let edges = network.step(&heat(&[]), 1.0);
            if edges.iter().any(|e| e.node == "core" && !e.tripped) {
                cleared = true;
                assert!(network.temp_c("core").unwrap() <= 85.0);
                break;
            }
        }
        assert!(cleared);
        assert!(!network.is_tripped("core"));
    }

    #[test]
    fn test_coupling_pulls_temperatures_together() {
        let config = ThermalConfig::default();
        let mut network = ThermalNetwork::new(&config);
        // Heat only the core; the pdu must warm through the coupling.
        let before_pdu = network.temp_c("pdu").unwrap();
        for _ in 0..100 {
            network.step(&heat(&[("core", 1000.0)]), 1.0);
        }
        assert!(network.temp_c("pdu").unwrap() > before_pdu);
    }
}
