use crate::error::ParkError;
use crate::simulator::types::{ScenarioComparison, ScenarioMetrics, SimulationResult};

/// Ranks scenarios by `stress_change`, most relief first. Ties keep the order
/// the scenarios were given in.
pub fn compare_scenarios(results: &[SimulationResult]) -> Result<ScenarioComparison, ParkError> {
    if results.is_empty() {
        return Err(ParkError::NoScenarios);
    }

    let comparison_metrics: Vec<ScenarioMetrics> = results
        .iter()
        .map(|r| ScenarioMetrics {
            name: r.scenario_name.clone(),
            policy_type: r.policy_type,
            projected_available: r.projected.total_available,
            stress_change: r.projected.stress_change,
        })
        .collect();

    let mut ranked: Vec<&ScenarioMetrics> = comparison_metrics.iter().collect();
    ranked.sort_by_key(|m| m.stress_change);
    let ranking: Vec<String> = ranked.iter().map(|m| m.name.clone()).collect();

    let recommendation = ranking.first().cloned().unwrap_or_default();

    Ok(ScenarioComparison {
        scenarios_compared: results.len(),
        comparison_metrics,
        ranking,
        recommendation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Agency, CarparkRecord, Dataset, LotType, Status};
    use crate::simulator::model::PolicySimulator;
    use crate::simulator::types::InterventionKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_comparison_is_an_error() {
        assert_eq!(compare_scenarios(&[]), Err(ParkError::NoScenarios));
    }

    #[test]
    fn test_ranks_by_stress_relief_across_models() {
        let sim = PolicySimulator::new();
        let ds = stressed_dataset();

        // 20 stressed: pricing +10% keeps 19, capacity +25% keeps 15
        let pricing = sim.simulate_pricing(&ds, 10.0, None);
        let capacity = sim.simulate_capacity(&ds, 25.0, None);
        let worse = sim.simulate_capacity(&ds, -20.0, None);

        let comparison = compare_scenarios(&[pricing, worse, capacity]).unwrap();

        assert_eq!(comparison.scenarios_compared, 3);
        assert_eq!(
            comparison.ranking,
            vec![
                "Capacity Change: +25%".to_string(),
                "Pricing Policy: +10%".to_string(),
                "Capacity Change: -20%".to_string(),
            ]
        );
        assert_eq!(comparison.recommendation, "Capacity Change: +25%");
        assert_eq!(comparison.comparison_metrics[1].stress_change, 4);
    }

    #[test]
    fn test_mixed_intervention_is_comparable() {
        let sim = PolicySimulator::new();
        let ds = stressed_dataset();
        let results: Vec<_> = InterventionKind::ALL
            .iter()
            .map(|kind| sim.simulate_intervention(&ds, *kind))
            .collect();

        let comparison = compare_scenarios(&results).unwrap();
        assert_eq!(comparison.ranking.len(), 3);
        // URA holds 10 stressed; the mixed preset keeps 6 of them
        let mixed = comparison
            .comparison_metrics
            .iter()
            .find(|m| m.name == "URA Mixed Intervention")
            .unwrap();
        assert_eq!(mixed.stress_change, -4);
        assert_eq!(comparison.recommendation, "URA Mixed Intervention");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sim = PolicySimulator::new();
        let ds = stressed_dataset();
        let a = sim.simulate_pricing(&ds, 0.0, None);
        let b = sim.simulate_capacity(&ds, 0.0, None);

        let comparison = compare_scenarios(&[a, b]).unwrap();
        assert_eq!(comparison.recommendation, "Pricing Policy: +0%");
    }

    // Helper functions for tests
    fn stressed_dataset() -> Dataset {
        let fetch_time = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let records = (0..40)
            .map(|i| {
                let (agency, lots) = match i {
                    0..10 => (Agency::Ura, 0),
                    10..20 => (Agency::Hdb, 5),
                    _ => (Agency::Hdb, 80),
                };
                CarparkRecord {
                    carpark_id: i.to_string(),
                    development: format!("Dev {i}"),
                    agency,
                    area: None,
                    lot_type: LotType::Car,
                    available_lots: lots,
                    latitude: None,
                    longitude: None,
                    status: Status::from_lots(lots),
                    fetch_time,
                }
            })
            .collect();
        Dataset::from_records(records, fetch_time)
    }
}
