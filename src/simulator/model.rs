//! Closed-form elasticity models.
//!
//! These are transparent what-if estimates, not calibrated forecasts. Every
//! result carries its methodology and an uncertainty band.

use chrono::Utc;
use tracing::debug;

use crate::analyzers::aggregate::{Rollup, group_by};
use crate::analyzers::utility::round_to;
use crate::dataset::{Agency, CarparkRecord, Dataset};
use crate::simulator::types::{
    AgencyBaseline, Baseline, CAPACITY_ASSUMPTION, InterventionKind, Methodology, PolicyKind,
    PolicyParameters, Projection, ProjectionDetail, SimulationResult,
};

/// A 10% price rise cuts demand by 3%.
pub const PRICE_ELASTICITY: f64 = -0.3;
/// A 10% capacity rise lifts utilization by 5%.
pub const CAPACITY_ELASTICITY: f64 = 0.5;
/// Share of suppressed demand that moves to untargeted carparks.
pub const SPILLOVER_RATE: f64 = 0.15;
/// Background utilization assumed when estimating capacity.
pub const ASSUMED_UTILIZATION: f64 = 0.7;

/// The agency the preset interventions target.
pub const INTERVENTION_AGENCY: Agency = Agency::Ura;

const MIXED_PRICE_RISE: f64 = 0.15;
const MIXED_CAPACITY_RISE: f64 = 0.10;
const MIXED_STRESS_RETAINED: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicySimulator {
    pub price_elasticity: f64,
    pub capacity_elasticity: f64,
    pub spillover_rate: f64,
    pub assumed_utilization: f64,
}

impl Default for PolicySimulator {
    fn default() -> Self {
        Self {
            price_elasticity: PRICE_ELASTICITY,
            capacity_elasticity: CAPACITY_ELASTICITY,
            spillover_rate: SPILLOVER_RATE,
            assumed_utilization: ASSUMED_UTILIZATION,
        }
    }
}

impl PolicySimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self, dataset: &Dataset) -> Baseline {
        let total_available = dataset.total_available();
        let capacity = self.estimate_capacity(total_available);
        let utilization_rate = if capacity > 0 {
            round_to((1.0 - total_available as f64 / capacity as f64) * 100.0, 1)
        } else {
            0.0
        };

        let by_agency = group_by(dataset.records(), |r| r.agency.clone())
            .into_iter()
            .map(|(agency, group)| {
                let rollup = Rollup::from_records(group);
                AgencyBaseline {
                    agency,
                    carparks: rollup.count,
                    available: rollup.total_lots,
                    stressed: rollup.stressed,
                    avg_availability: round_to(rollup.mean, 1),
                }
            })
            .collect();

        Baseline {
            name: "Current Baseline".to_string(),
            timestamp: Utc::now(),
            total_carparks: dataset.len(),
            total_capacity_estimate: capacity,
            total_available,
            utilization_rate,
            stressed_carparks: dataset.stressed_count(),
            by_agency,
            capacity_note: CAPACITY_ASSUMPTION,
        }
    }

    /// Projects a price change of `price_change_percent` on `target` (every
    /// carpark when `None`).
    ///
    /// Availability moves inversely to demand on the targeted subset. Part of
    /// the suppressed demand spills onto the untargeted subset; when nothing
    /// is untargeted the spillover is still reported but has nowhere to land.
    pub fn simulate_pricing(
        &self,
        dataset: &Dataset,
        price_change_percent: f64,
        target: Option<&Agency>,
    ) -> SimulationResult {
        let baseline = self.baseline(dataset);

        let demand_change = self.price_elasticity * (price_change_percent / 100.0);
        let availability_change = -demand_change;

        let (target_lots, other_lots) = split_lots(dataset, target);
        let new_target = (target_lots as f64 * (1.0 + availability_change)) as i64;
        let spillover_lots =
            (demand_change.abs() * target_lots as f64 * self.spillover_rate) as u64;
        let new_other = match other_lots {
            Some(lots) => lots as i64 - spillover_lots as i64,
            None => 0,
        };

        let stress_reduction = demand_change.abs() * 0.5;
        let new_stressed = scale_count(baseline.stressed_carparks, 1.0 - stress_reduction);

        debug!(
            price_change_percent,
            demand_change, spillover_lots, new_stressed, "Pricing policy simulated"
        );

        let projected = Projection {
            total_available: new_target + new_other,
            stressed_carparks: new_stressed,
            stress_change: new_stressed as i64 - baseline.stressed_carparks as i64,
            detail: ProjectionDetail::Pricing {
                availability_change_percent: availability_change * 100.0,
                spillover_lots,
            },
        };

        SimulationResult {
            scenario_name: format!("Pricing Policy: {price_change_percent:+.0}%"),
            policy_type: PolicyKind::Pricing,
            parameters: PolicyParameters {
                price_change_percent: Some(price_change_percent),
                capacity_change_percent: None,
                target_agency: target.cloned(),
            },
            baseline,
            projected,
            methodology: Methodology {
                model: "Price Elasticity Model",
                elasticity_used: Some(self.price_elasticity),
                assumption: "Demand responds to price according to standard elasticity",
                uncertainty: "±20% due to local factors",
            },
            rationale: None,
        }
    }

    /// Projects a change of `capacity_change_percent` in the lots of `target`
    /// (every carpark when `None`). New capacity induces some new demand, so
    /// only part of it shows up as availability.
    pub fn simulate_capacity(
        &self,
        dataset: &Dataset,
        capacity_change_percent: f64,
        target: Option<&Agency>,
    ) -> SimulationResult {
        let baseline = self.baseline(dataset);

        let (target_lots, _) = split_lots(dataset, target);
        let capacity_delta = target_lots as f64 * (capacity_change_percent / 100.0);
        let induced_demand = capacity_delta * self.capacity_elasticity;
        let net_change = capacity_delta - induced_demand;
        let new_total = (baseline.total_available as f64 + net_change) as i64;

        let new_stressed = if capacity_change_percent > 0.0 {
            let reduction = (capacity_change_percent / 100.0).min(0.3);
            scale_count(baseline.stressed_carparks, 1.0 - reduction)
        } else {
            let increase = (capacity_change_percent.abs() / 100.0).min(0.5);
            scale_count(baseline.stressed_carparks, 1.0 + increase)
        };

        debug!(
            capacity_change_percent,
            capacity_delta, induced_demand, new_stressed, "Capacity change simulated"
        );

        let projected = Projection {
            total_available: new_total,
            stressed_carparks: new_stressed,
            stress_change: new_stressed as i64 - baseline.stressed_carparks as i64,
            detail: ProjectionDetail::Capacity {
                net_availability_change: net_change as i64,
                induced_demand: induced_demand as i64,
            },
        };

        SimulationResult {
            scenario_name: format!("Capacity Change: {capacity_change_percent:+.0}%"),
            policy_type: PolicyKind::Capacity,
            parameters: PolicyParameters {
                price_change_percent: None,
                capacity_change_percent: Some(capacity_change_percent),
                target_agency: target.cloned(),
            },
            baseline,
            projected,
            methodology: Methodology {
                model: "Capacity-Demand Equilibrium Model",
                elasticity_used: Some(self.capacity_elasticity),
                assumption: "Additional capacity induces some new demand",
                uncertainty: "±25% due to location-specific factors",
            },
            rationale: None,
        }
    }

    /// Runs one of the preset interventions on [`INTERVENTION_AGENCY`].
    pub fn simulate_intervention(
        &self,
        dataset: &Dataset,
        kind: InterventionKind,
    ) -> SimulationResult {
        let target = INTERVENTION_AGENCY;
        match kind {
            InterventionKind::Pricing => {
                let mut result = self.simulate_pricing(dataset, 25.0, Some(&target));
                result.scenario_name = format!("{target} Pricing Intervention (+25%)");
                result.rationale =
                    Some("Higher prices to reduce demand in stressed commercial areas".to_string());
                result
            }
            InterventionKind::Capacity => {
                let mut result = self.simulate_capacity(dataset, 15.0, Some(&target));
                result.scenario_name = format!("{target} Capacity Expansion (+15%)");
                result.rationale = Some("Additional parking in commercial developments".to_string());
                result
            }
            InterventionKind::Mixed => self.simulate_mixed(dataset, &target),
        }
    }

    /// A 15% price rise combined with a 10% capacity rise.
    fn simulate_mixed(&self, dataset: &Dataset, target: &Agency) -> SimulationResult {
        let baseline = self.baseline(dataset);

        let pricing_effect = self.price_elasticity * MIXED_PRICE_RISE;
        let net_improvement = -pricing_effect + MIXED_CAPACITY_RISE
            - MIXED_CAPACITY_RISE * self.capacity_elasticity;

        let rollup = Rollup::from_records(dataset.agency(target));
        let new_agency_available = (rollup.total_lots as f64 * (1.0 + net_improvement)) as i64;
        let new_agency_stressed = scale_count(rollup.stressed, MIXED_STRESS_RETAINED);

        let stress_change = new_agency_stressed as i64 - rollup.stressed as i64;
        let total_available =
            baseline.total_available as i64 - rollup.total_lots as i64 + new_agency_available;
        let stressed_carparks = (baseline.stressed_carparks as i64 + stress_change).max(0) as usize;

        debug!(
            agency = %target,
            net_improvement, new_agency_available, new_agency_stressed, "Mixed intervention simulated"
        );

        let projected = Projection {
            total_available,
            stressed_carparks,
            stress_change,
            detail: ProjectionDetail::Mixed {
                agency_available: new_agency_available,
                agency_stressed_before: rollup.stressed,
                agency_stressed_after: new_agency_stressed,
                net_improvement_percent: net_improvement * 100.0,
            },
        };

        SimulationResult {
            scenario_name: format!("{target} Mixed Intervention"),
            policy_type: PolicyKind::Mixed,
            parameters: PolicyParameters {
                price_change_percent: Some(MIXED_PRICE_RISE * 100.0),
                capacity_change_percent: Some(MIXED_CAPACITY_RISE * 100.0),
                target_agency: Some(target.clone()),
            },
            baseline,
            projected,
            methodology: Methodology {
                model: "Combined Policy Impact Model",
                elasticity_used: None,
                assumption: "Pricing and capacity effects are partially additive",
                uncertainty: "±30% due to interaction effects",
            },
            rationale: Some(
                "Combined pricing and capacity approach for optimal impact".to_string(),
            ),
        }
    }

    fn estimate_capacity(&self, available: u64) -> u64 {
        (available as f64 / (1.0 - self.assumed_utilization)) as u64
    }
}

/// Available lots of the targeted subset, and of the untargeted subset when
/// one exists.
fn split_lots(dataset: &Dataset, target: Option<&Agency>) -> (u64, Option<u64>) {
    let Some(target) = target else {
        return (dataset.total_available(), None);
    };

    let (targeted, other): (Vec<&CarparkRecord>, Vec<&CarparkRecord>) =
        dataset.iter().partition(|r| &r.agency == target);
    let sum = |records: &[&CarparkRecord]| -> u64 {
        records.iter().map(|r| r.available_lots as u64).sum()
    };

    let other_lots = if other.is_empty() {
        None
    } else {
        Some(sum(&other))
    };
    (sum(&targeted), other_lots)
}

/// Scales a count, truncating toward zero and flooring at zero.
fn scale_count(count: usize, factor: f64) -> usize {
    (count as f64 * factor).max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LotType, Status};
    use chrono::TimeZone;

    #[test]
    fn test_baseline_estimates_capacity() {
        let sim = PolicySimulator::new();
        let baseline = sim.baseline(&dataset(&[(Agency::Hdb, 301), (Agency::Ura, 0)]));

        assert_eq!(baseline.total_available, 301);
        assert_eq!(baseline.total_capacity_estimate, 1003);
        assert_eq!(baseline.utilization_rate, 70.0);
        assert_eq!(baseline.stressed_carparks, 1);
        assert_eq!(baseline.by_agency.len(), 2);
        assert_eq!(baseline.agency(&Agency::Ura).unwrap().stressed, 1);
        assert!(baseline.capacity_note.contains("assumption"));
    }

    #[test]
    fn test_baseline_empty_dataset() {
        let sim = PolicySimulator::new();
        let baseline = sim.baseline(&dataset(&[]));
        assert_eq!(baseline.total_capacity_estimate, 0);
        assert_eq!(baseline.utilization_rate, 0.0);
        assert!(baseline.by_agency.is_empty());
    }

    #[test]
    fn test_pricing_zero_change_matches_baseline() {
        let sim = PolicySimulator::new();
        let ds = dataset(&[(Agency::Hdb, 100), (Agency::Ura, 5), (Agency::Lta, 40)]);

        for target in [None, Some(&Agency::Ura)] {
            let result = sim.simulate_pricing(&ds, 0.0, target);
            assert_eq!(result.projected.total_available, 145);
            assert_eq!(result.projected.stress_change, 0);
            match result.projected.detail {
                ProjectionDetail::Pricing { spillover_lots, .. } => assert_eq!(spillover_lots, 0),
                ref other => panic!("unexpected detail {other:?}"),
            }
        }
    }

    #[test]
    fn test_pricing_whole_dataset() {
        let sim = PolicySimulator::new();
        let ds = dataset(&[(Agency::Hdb, 1000), (Agency::Ura, 5), (Agency::Ura, 5)]);
        let result = sim.simulate_pricing(&ds, 20.0, None);

        // demand falls 6%, availability rises 6% of 1010
        assert_eq!(result.projected.total_available, 1070);
        // 2 stressed * (1 - 0.03) truncates to 1
        assert_eq!(result.projected.stressed_carparks, 1);
        assert_eq!(result.projected.stress_change, -1);
        assert_eq!(result.scenario_name, "Pricing Policy: +20%");
        assert_eq!(result.methodology.uncertainty, "±20% due to local factors");
        assert_eq!(result.methodology.elasticity_used, Some(-0.3));
        assert_eq!(result.parameters.target_label(), "All");
    }

    #[test]
    fn test_pricing_spillover_lands_on_other_agencies() {
        let sim = PolicySimulator::new();
        let ds = dataset(&[(Agency::Ura, 1000), (Agency::Hdb, 500)]);
        let result = sim.simulate_pricing(&ds, 100.0, Some(&Agency::Ura));

        // demand -30%: URA 1000 -> 1300, spillover 0.3 * 1000 * 0.15 = 45
        match result.projected.detail {
            ProjectionDetail::Pricing { spillover_lots, .. } => assert_eq!(spillover_lots, 45),
            ref other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(result.projected.total_available, 1300 + 500 - 45);
        assert_eq!(result.parameters.target_label(), "URA");
    }

    #[test]
    fn test_capacity_expansion() {
        let sim = PolicySimulator::new();
        let ds = dataset(&[(Agency::Hdb, 1000), (Agency::Ura, 5), (Agency::Lta, 0)]);
        let result = sim.simulate_capacity(&ds, 10.0, Some(&Agency::Hdb));

        match result.projected.detail {
            ProjectionDetail::Capacity {
                net_availability_change,
                induced_demand,
            } => {
                assert_eq!(net_availability_change, 50);
                assert_eq!(induced_demand, 50);
            }
            ref other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(result.projected.total_available, 1055);
        // 2 stressed * 0.9 truncates to 1
        assert_eq!(result.projected.stressed_carparks, 1);
        assert_eq!(result.methodology.model, "Capacity-Demand Equilibrium Model");
        assert_eq!(result.scenario_name, "Capacity Change: +10%");
    }

    #[test]
    fn test_capacity_reduction_caps_stress_increase() {
        let sim = PolicySimulator::new();
        let stressed: Vec<(Agency, u32)> = std::iter::repeat_n((Agency::Hdb, 0), 10).collect();
        let result = sim.simulate_capacity(&dataset(&stressed), -80.0, None);

        // increase capped at 50%
        assert_eq!(result.projected.stressed_carparks, 15);
        assert_eq!(result.projected.stress_change, 5);
        assert_eq!(result.scenario_name, "Capacity Change: -80%");
    }

    #[test]
    fn test_intervention_presets() {
        let sim = PolicySimulator::new();
        let ds = dataset(&[(Agency::Ura, 1000), (Agency::Ura, 0), (Agency::Hdb, 200)]);

        let pricing = sim.simulate_intervention(&ds, InterventionKind::Pricing);
        assert_eq!(pricing.scenario_name, "URA Pricing Intervention (+25%)");
        assert_eq!(pricing.parameters.price_change_percent, Some(25.0));
        assert!(pricing.rationale.is_some());

        let capacity = sim.simulate_intervention(&ds, InterventionKind::Capacity);
        assert_eq!(capacity.scenario_name, "URA Capacity Expansion (+15%)");
        assert_eq!(capacity.parameters.capacity_change_percent, Some(15.0));
    }

    #[test]
    fn test_mixed_intervention() {
        let sim = PolicySimulator::new();
        let mut lots: Vec<(Agency, u32)> = vec![(Agency::Ura, 1010), (Agency::Hdb, 200)];
        lots.extend(std::iter::repeat_n((Agency::Ura, 0), 5));
        let result = sim.simulate_intervention(&dataset(&lots), InterventionKind::Mixed);

        match result.projected.detail {
            ProjectionDetail::Mixed {
                agency_available,
                agency_stressed_before,
                agency_stressed_after,
                net_improvement_percent,
            } => {
                assert!((net_improvement_percent - 9.5).abs() < 1e-9);
                assert_eq!(agency_available, 1105);
                assert_eq!(agency_stressed_before, 5);
                assert_eq!(agency_stressed_after, 3);
            }
            ref other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(result.projected.stress_change, -2);
        assert_eq!(result.projected.total_available, 1305);
        assert_eq!(result.methodology.uncertainty, "±30% due to interaction effects");
    }

    #[test]
    fn test_unknown_intervention_is_an_error() {
        let err = "zoning".parse::<InterventionKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown intervention type: zoning");
        assert_eq!(
            "Mixed".parse::<InterventionKind>().unwrap(),
            InterventionKind::Mixed
        );
    }

    // Helper functions for tests
    fn dataset(lots: &[(Agency, u32)]) -> Dataset {
        let fetch_time = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let records = lots
            .iter()
            .enumerate()
            .map(|(i, (agency, lots))| CarparkRecord {
                carpark_id: i.to_string(),
                development: format!("Dev {i}"),
                agency: agency.clone(),
                area: None,
                lot_type: LotType::Car,
                available_lots: *lots,
                latitude: None,
                longitude: None,
                status: Status::from_lots(*lots),
                fetch_time,
            })
            .collect();
        Dataset::from_records(records, fetch_time)
    }
}
