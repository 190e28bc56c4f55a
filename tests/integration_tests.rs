use chrono::{Duration, TimeZone, Utc};
use parksense::alerts::{AlertEngine, AlertLevel, AlertThresholds};
use parksense::analyzers::analyzer::{compare_agencies, generate_report, identify_stress_points};
use parksense::analyzers::grade::HealthStatus;
use parksense::analyzers::types::ClusterSeverity;
use parksense::dataset::{Agency, CarparkRecord, Dataset, LotType, Status};
use parksense::history::HistoricalTracker;
use parksense::parser::parse_carparks;
use parksense::search::{CarparkFilter, find_nearest, lookup_location, search};
use parksense::session::Session;
use parksense::simulator::model::PolicySimulator;
use parksense::simulator::{PolicyScenario, compare_scenarios};
use std::sync::Arc;

fn fixture_dataset() -> Dataset {
    let bytes = include_bytes!("fixtures/carparks.json");
    let raw = parse_carparks(bytes).expect("Failed to parse fixture");
    Dataset::from_raw(raw, Utc.with_ymd_and_hms(2026, 3, 2, 18, 30, 0).unwrap())
}

#[test]
fn test_full_pipeline() {
    let dataset = fixture_dataset();
    assert_eq!(dataset.len(), 12);
    assert_eq!(dataset.total_available(), 689);

    let report = generate_report(&dataset);
    let health = &report.overall_health;
    assert_eq!(health.total_carparks, 12);
    assert_eq!(health.stressed_carparks, 7);
    assert_eq!(
        health.stressed_carparks + health.moderate_carparks + health.healthy_carparks,
        health.total_carparks
    );
    assert_eq!(health.health_score, 25.0);
    assert_eq!(health.status, HealthStatus::Stressed);

    // agencies in first-seen order
    let agencies: Vec<&Agency> = report.agency_analysis.iter().map(|a| &a.agency).collect();
    assert_eq!(agencies, vec![&Agency::Lta, &Agency::Hdb, &Agency::Ura]);

    assert!(report.stress_points.iter().all(|r| r.available_lots <= 10));
    assert!(
        report
            .stress_points
            .windows(2)
            .all(|w| w[0].available_lots <= w[1].available_lots)
    );

    assert_eq!(report.spatial_clusters.len(), 1);
    let cluster = &report.spatial_clusters[0];
    assert_eq!(cluster.cell, "129_10385");
    assert_eq!(cluster.stressed_carparks, 3);
    assert_eq!(cluster.severity, ClusterSeverity::Moderate);

    let comparison = compare_agencies(&dataset);
    assert_eq!(comparison.best_performer, Some(Agency::Hdb));
}

#[test]
fn test_malformed_fields_are_normalized() {
    let dataset = fixture_dataset();

    let telok = dataset
        .iter()
        .find(|r| r.development == "TELOK AYER")
        .unwrap();
    assert_eq!(telok.available_lots, 0);
    assert_eq!(telok.position(), None);
    assert_eq!(telok.lot_type, LotType::HeavyVehicle);

    let amk = dataset.iter().find(|r| r.carpark_id == "A0007").unwrap();
    assert_eq!(amk.available_lots, 120);
    assert_eq!(amk.area, None);
}

#[test]
fn test_fixture_alerts() {
    let dataset = fixture_dataset();
    let mut engine = AlertEngine::new(AlertThresholds::default());
    let alerts = engine.evaluate(&dataset).to_vec();

    assert_eq!(alerts[0].title, "System Under Critical Stress");
    assert!(alerts.iter().any(|a| a.title == "LTA Critical"));
    assert!(alerts.iter().any(|a| a.title == "URA Critical"));
    assert!(alerts.iter().any(|a| a.title == "HDB Warning"));
    assert_eq!(alerts.iter().filter(|a| a.title.ends_with("FULL")).count(), 3);

    let summary = engine.summary();
    assert_eq!(summary.total, 7);
    assert_eq!(summary.critical, 6);
    assert_eq!(summary.warning, 1);
}

#[test]
fn test_fixture_search_and_nearest() {
    let dataset = fixture_dataset();

    let amk = search(&dataset, &CarparkFilter::new().query("ang mo kio"));
    assert_eq!(amk.len(), 2);

    let marina = lookup_location("Marina Bay").unwrap();
    let nearest = find_nearest(&dataset, marina.lat, marina.lon, 3, 1, None).unwrap();
    assert_eq!(nearest.len(), 3);
    assert_eq!(nearest[0].development, "Marina Square");
    assert!(nearest.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    assert!(nearest.iter().all(|n| n.available_lots >= 1));
}

#[test]
fn test_fixture_policy_comparison() {
    let dataset = fixture_dataset();
    let simulator = PolicySimulator::new();

    let unchanged = simulator.simulate_pricing(&dataset, 0.0, None);
    assert_eq!(unchanged.projected.total_available, 689);
    assert_eq!(unchanged.projected.stress_change, 0);

    let results = simulator.run_all(&dataset, &PolicyScenario::presets());
    let comparison = compare_scenarios(&results).unwrap();
    assert_eq!(comparison.scenarios_compared, 5);
    let best = &comparison.comparison_metrics
        [results.iter().position(|r| r.scenario_name == comparison.recommendation).unwrap()];
    assert!(
        comparison
            .comparison_metrics
            .iter()
            .all(|m| best.stress_change <= m.stress_change)
    );
}

#[test]
fn test_session_ticks_over_fixture() {
    let mut session = Session::new(2, AlertThresholds::default());
    let first = Arc::new(fixture_dataset());

    session.tick(Arc::clone(&first));
    session.tick(Arc::clone(&first));
    let outcome = session.tick(first);

    assert_eq!(session.tracker().len(), 2);
    assert_eq!(outcome.availability_change.change, 0);
    assert_eq!(outcome.alert_summary.total, 7);
}

/// 100 carparks split 40/40/20 across agencies: 15 full, 10 with 5 lots and
/// 75 with 60 lots.
#[test]
fn test_quarter_stressed_scenario() {
    let fetch_time = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let records: Vec<CarparkRecord> = (0..100)
        .map(|i| {
            let agency = match i % 5 {
                0 | 1 => Agency::Hdb,
                2 | 3 => Agency::Lta,
                _ => Agency::Ura,
            };
            let lots = match i {
                0..15 => 0,
                15..25 => 5,
                _ => 60,
            };
            CarparkRecord {
                carpark_id: format!("CP{i:03}"),
                development: format!("Carpark {i}"),
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
    let dataset = Dataset::from_records(records, fetch_time);

    let report = generate_report(&dataset);
    let health = &report.overall_health;
    assert_eq!(health.stressed_carparks, 25);
    assert_eq!(health.stress_percentage, 25.0);
    assert_eq!(health.health_score, 75.0);
    assert_eq!(health.status, HealthStatus::Good);

    let counts: Vec<usize> = report.agency_analysis.iter().map(|a| a.total_carparks).collect();
    assert_eq!(counts, vec![40, 40, 20]);

    let mut engine = AlertEngine::default();
    let alerts = engine.evaluate(&dataset).to_vec();
    let system = alerts.iter().find(|a| a.agency.is_none() && a.carpark_id.is_none());
    assert_eq!(system.map(|a| a.level), Some(AlertLevel::Warning));
    assert_eq!(system.map(|a| a.title.as_str()), Some("Elevated System Stress"));
    assert!(alerts.iter().any(|a| a.title == "Multiple Carparks Near Capacity"));
}

/// Keeps the "largest among the stressed" truncation rule when more than
/// `top_n` carparks are stressed.
#[test]
fn test_stress_point_truncation_keeps_least_stressed() {
    let dataset = fixture_dataset();
    let points = identify_stress_points(&dataset, 2);
    let lots: Vec<u32> = points.iter().map(|r| r.available_lots).collect();
    assert_eq!(lots, vec![4, 8]);
}

#[test]
fn test_tracker_evicts_oldest_first() {
    let base = fixture_dataset();
    let mut tracker = HistoricalTracker::new(3);

    for minute in 0..4 {
        let fetch_time = base.fetch_time() + Duration::minutes(minute);
        tracker.add_snapshot(&Dataset::from_records(base.records().to_vec(), fetch_time));
    }

    let times: Vec<_> = tracker.snapshots().map(|s| s.timestamp).collect();
    assert_eq!(times.len(), 3);
    assert_eq!(times[0], base.fetch_time() + Duration::minutes(1));
    assert!(times.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_mixed_validity_payload_keeps_good_records() {
    let bytes = br#"{"value": [
        {"CarParkID": "1", "Area": "Marina", "Development": "Suntec City",
         "Location": "1.29375 103.85718", "AvailableLots": 442, "LotType": "C", "Agency": "LTA"},
        {"CarParkID": "2", "Area": 7, "Development": "Blk 2",
         "Location": 103.8, "AvailableLots": "9", "LotType": "C", "Agency": "HDB"},
        "not a carpark"
    ]}"#;
    let raw = parse_carparks(bytes).unwrap();
    let dataset = Dataset::from_raw(raw, Utc.with_ymd_and_hms(2026, 3, 2, 18, 30, 0).unwrap());

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.total_available(), 451);
    assert_eq!(dataset.area("Marina").count(), 1);

    let blk2 = dataset.iter().find(|r| r.carpark_id == "2").unwrap();
    assert_eq!(blk2.agency, Agency::Hdb);
    assert_eq!(blk2.position(), None);
    assert!(blk2.is_stressed());
}
