//! Per-session state carried between refreshes.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::alerts::{Alert, AlertEngine, AlertSummary, AlertThresholds};
use crate::analyzers::analyzer::generate_report;
use crate::analyzers::types::AnalysisReport;
use crate::dataset::Dataset;
use crate::history::{AvailabilityChange, DEFAULT_MAX_SNAPSHOTS, HistoricalTracker, Snapshot};

/// What one refresh produced.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    #[serde(skip)]
    pub dataset: Arc<Dataset>,
    pub report: AnalysisReport,
    pub alerts: Vec<Alert>,
    pub alert_summary: AlertSummary,
    pub snapshot: Snapshot,
    pub availability_change: AvailabilityChange,
}

/// Owns the mutable state of one consumer: the snapshot history and the last
/// alert evaluation. Each tick takes a fresh immutable dataset, so nothing
/// under analysis is ever mutated mid-tick.
#[derive(Debug, Clone)]
pub struct Session {
    tracker: HistoricalTracker,
    alerts: AlertEngine,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS, AlertThresholds::default())
    }
}

impl Session {
    pub fn new(max_snapshots: usize, thresholds: AlertThresholds) -> Self {
        Self {
            tracker: HistoricalTracker::new(max_snapshots),
            alerts: AlertEngine::new(thresholds),
        }
    }

    pub fn tracker(&self) -> &HistoricalTracker {
        &self.tracker
    }

    pub fn alert_engine(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Analyze, alert, then track, all against the same dataset.
    pub fn tick(&mut self, dataset: Arc<Dataset>) -> TickOutcome {
        let report = generate_report(&dataset);
        let alerts = self.alerts.evaluate(&dataset).to_vec();
        let alert_summary = self.alerts.summary();
        let snapshot = self.tracker.add_snapshot(&dataset).clone();
        let availability_change = self.tracker.availability_change();

        info!(
            carparks = dataset.len(),
            alerts = alerts.len(),
            critical = alert_summary.critical,
            snapshots = self.tracker.len(),
            change = availability_change.change,
            "Tick complete"
        );

        TickOutcome {
            dataset,
            report,
            alerts,
            alert_summary,
            snapshot,
            availability_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Agency, CarparkRecord, LotType, Status};
    use crate::history::TrendDirection;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_tick_runs_the_whole_pipeline() {
        let mut session = Session::default();
        let outcome = session.tick(Arc::new(dataset(0, &[0, 0, 60, 60])));

        assert_eq!(outcome.report.overall_health.stressed_carparks, 2);
        assert_eq!(outcome.alert_summary.total, outcome.alerts.len());
        assert!(outcome.alert_summary.critical > 0);
        assert_eq!(outcome.snapshot.total_available, 120);
        assert_eq!(outcome.availability_change.direction, TrendDirection::Stable);
        assert_eq!(session.tracker().len(), 1);
    }

    #[test]
    fn test_consecutive_ticks_track_change() {
        let mut session = Session::new(2, AlertThresholds::default());
        session.tick(Arc::new(dataset(0, &[100, 100])));
        session.tick(Arc::new(dataset(1, &[80, 100])));
        let outcome = session.tick(Arc::new(dataset(2, &[50, 100])));

        assert_eq!(session.tracker().len(), 2);
        assert_eq!(outcome.availability_change.change, -30);
        assert_eq!(outcome.availability_change.direction, TrendDirection::Decreasing);
        assert!(outcome.alerts.is_empty());
        assert!(session.alert_engine().alerts().is_empty());
    }

    // Helper functions for tests
    fn dataset(minute: i64, lots: &[u32]) -> Dataset {
        let fetch_time = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minute);
        let records = lots
            .iter()
            .enumerate()
            .map(|(i, lots)| CarparkRecord {
                carpark_id: i.to_string(),
                development: format!("Dev {i}"),
                agency: Agency::Hdb,
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
