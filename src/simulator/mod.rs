//! What-if policy simulation over a dataset.
//!
//! The models are closed-form elasticity estimates meant for explaining the
//! direction and rough size of an effect. Projections are never fed back into
//! a dataset.

pub mod compare;
pub mod model;
pub mod types;

use serde::Serialize;

use crate::dataset::{Agency, Dataset};
use crate::simulator::model::PolicySimulator;
use crate::simulator::types::{InterventionKind, SimulationResult};

pub use compare::compare_scenarios;

/// A policy lever and its setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "policy_type", rename_all = "snake_case")]
pub enum Policy {
    Pricing {
        price_change_percent: f64,
        target_agency: Option<Agency>,
    },
    Capacity {
        capacity_change_percent: f64,
        target_agency: Option<Agency>,
    },
    Intervention { kind: InterventionKind },
}

/// A named policy to run through the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyScenario {
    pub name: String,
    pub description: String,
    pub policy: Policy,
}

impl PolicyScenario {
    pub fn new(name: impl Into<String>, description: impl Into<String>, policy: Policy) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            policy,
        }
    }

    /// The scenario set offered when none is given.
    pub fn presets() -> Vec<PolicyScenario> {
        vec![
            PolicyScenario::new(
                "Citywide Pricing +20%",
                "Raise parking prices by 20% across every agency",
                Policy::Pricing {
                    price_change_percent: 20.0,
                    target_agency: None,
                },
            ),
            PolicyScenario::new(
                "Citywide Capacity +15%",
                "Add 15% more lots across every agency",
                Policy::Capacity {
                    capacity_change_percent: 15.0,
                    target_agency: None,
                },
            ),
            PolicyScenario::new(
                "URA Pricing Intervention (+25%)",
                "Raise URA prices by 25%",
                Policy::Intervention {
                    kind: InterventionKind::Pricing,
                },
            ),
            PolicyScenario::new(
                "URA Capacity Expansion (+15%)",
                "Expand URA capacity by 15%",
                Policy::Intervention {
                    kind: InterventionKind::Capacity,
                },
            ),
            PolicyScenario::new(
                "URA Mixed Intervention",
                "Raise URA prices by 15% and expand URA capacity by 10%",
                Policy::Intervention {
                    kind: InterventionKind::Mixed,
                },
            ),
        ]
    }
}

impl PolicySimulator {
    /// Runs `scenario` through the matching model. The result is named after
    /// the scenario.
    pub fn run(&self, dataset: &Dataset, scenario: &PolicyScenario) -> SimulationResult {
        let mut result = match &scenario.policy {
            Policy::Pricing {
                price_change_percent,
                target_agency,
            } => self.simulate_pricing(dataset, *price_change_percent, target_agency.as_ref()),
            Policy::Capacity {
                capacity_change_percent,
                target_agency,
            } => self.simulate_capacity(dataset, *capacity_change_percent, target_agency.as_ref()),
            Policy::Intervention { kind } => self.simulate_intervention(dataset, *kind),
        };

        if !scenario.name.is_empty() {
            result.scenario_name = scenario.name.clone();
        }
        result
    }

    /// Runs every scenario in order.
    pub fn run_all(&self, dataset: &Dataset, scenarios: &[PolicyScenario]) -> Vec<SimulationResult> {
        scenarios.iter().map(|s| self.run(dataset, s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::types::PolicyKind;

    #[test]
    fn test_run_dispatches_and_renames() {
        let sim = PolicySimulator::new();
        let ds = Dataset::empty(chrono::Utc::now());

        let results = sim.run_all(&ds, &PolicyScenario::presets());
        let kinds: Vec<PolicyKind> = results.iter().map(|r| r.policy_type).collect();
        assert_eq!(
            kinds,
            vec![
                PolicyKind::Pricing,
                PolicyKind::Capacity,
                PolicyKind::Pricing,
                PolicyKind::Capacity,
                PolicyKind::Mixed,
            ]
        );
        assert_eq!(results[0].scenario_name, "Citywide Pricing +20%");
        assert_eq!(results[2].parameters.target_agency, Some(Agency::Ura));
    }

    #[test]
    fn test_unnamed_scenario_keeps_model_name() {
        let sim = PolicySimulator::new();
        let ds = Dataset::empty(chrono::Utc::now());
        let scenario = PolicyScenario::new(
            "",
            "",
            Policy::Capacity {
                capacity_change_percent: -10.0,
                target_agency: Some(Agency::Hdb),
            },
        );

        let result = sim.run(&ds, &scenario);
        assert_eq!(result.scenario_name, "Capacity Change: -10%");
        assert_eq!(result.projected.total_available, 0);
    }
}
