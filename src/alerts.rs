//! Threshold alerts over a dataset.
//!
//! Every call to [`AlertEngine::evaluate`] recomputes the full alert list from
//! scratch. Nothing is remembered between calls, so an alert whose metric hovers
//! around a threshold will appear and disappear from one evaluation to the next.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::analyzers::aggregate::{Rollup, group_by};
use crate::analyzers::utility::pct;
use crate::dataset::{Agency, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    /// Sort key: critical first.
    fn priority(self) -> u8 {
        match self {
            AlertLevel::Critical => 0,
            AlertLevel::Warning => 1,
            AlertLevel::Info => 2,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => f.write_str("INFO"),
            AlertLevel::Warning => f.write_str("WARNING"),
            AlertLevel::Critical => f.write_str("CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub agency: Option<Agency>,
    pub carpark_id: Option<String>,
    pub metric_value: Option<f64>,
}

/// Alert counts by level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

/// Rule thresholds. Percentages are stressed carparks over total, 0–100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertThresholds {
    pub system_critical_pct: f64,
    pub system_warning_pct: f64,
    pub agency_critical_pct: f64,
    pub agency_warning_pct: f64,
    /// Carparks at or below this many lots are near capacity.
    pub critical_availability: u32,
    /// Above this many near-capacity carparks, one summary alert replaces
    /// the per-carpark ones.
    pub max_individual_alerts: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            system_critical_pct: 30.0,
            system_warning_pct: 20.0,
            agency_critical_pct: 40.0,
            agency_warning_pct: 25.0,
            critical_availability: 5,
            max_individual_alerts: 10,
        }
    }
}

/// Holds the thresholds and the alerts from the most recent evaluation.
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
    alerts: Vec<Alert>,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            alerts: Vec::new(),
        }
    }

    /// Alerts from the last [`evaluate`](Self::evaluate) call.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Replaces the current alert list with a fresh evaluation of `dataset`,
    /// ordered critical, warning, info.
    pub fn evaluate(&mut self, dataset: &Dataset) -> &[Alert] {
        let now = Utc::now();
        let mut alerts = Vec::new();

        self.check_system_health(dataset, now, &mut alerts);
        self.check_agency_health(dataset, now, &mut alerts);
        self.check_critical_carparks(dataset, now, &mut alerts);

        alerts.sort_by_key(|a| a.level.priority());
        self.alerts = alerts;

        let summary = self.summary();
        info!(
            total = summary.total,
            critical = summary.critical,
            warning = summary.warning,
            "Alerts evaluated"
        );

        &self.alerts
    }

    pub fn summary(&self) -> AlertSummary {
        let count = |level: AlertLevel| self.alerts.iter().filter(|a| a.level == level).count();
        AlertSummary {
            total: self.alerts.len(),
            critical: count(AlertLevel::Critical),
            warning: count(AlertLevel::Warning),
            info: count(AlertLevel::Info),
        }
    }

    fn check_system_health(&self, dataset: &Dataset, now: DateTime<Utc>, alerts: &mut Vec<Alert>) {
        let stressed = dataset.stressed_count();
        let stress_pct = pct(stressed, dataset.len());

        let (level, title, message) = if stress_pct >= self.thresholds.system_critical_pct {
            (
                AlertLevel::Critical,
                "System Under Critical Stress".to_string(),
                format!(
                    "{stress_pct:.1}% of carparks ({stressed}) have critically low availability. \
                     Immediate attention required."
                ),
            )
        } else if stress_pct >= self.thresholds.system_warning_pct {
            (
                AlertLevel::Warning,
                "Elevated System Stress".to_string(),
                format!("{stress_pct:.1}% of carparks ({stressed}) showing stress. Monitor closely."),
            )
        } else {
            return;
        };

        alerts.push(Alert {
            level,
            title,
            message,
            timestamp: now,
            agency: None,
            carpark_id: None,
            metric_value: Some(stress_pct),
        });
    }

    fn check_agency_health(&self, dataset: &Dataset, now: DateTime<Utc>, alerts: &mut Vec<Alert>) {
        for (agency, group) in group_by(dataset.records(), |r| r.agency.clone()) {
            let rollup = Rollup::from_records(group);
            let (stressed, total) = (rollup.stressed, rollup.count);
            let stress_pct = pct(stressed, total);

            let (level, title, message) = if stress_pct >= self.thresholds.agency_critical_pct {
                (
                    AlertLevel::Critical,
                    format!("{agency} Critical"),
                    format!(
                        "{agency} has {stress_pct:.1}% stressed carparks ({stressed}/{total}). \
                         Agency requires immediate attention."
                    ),
                )
            } else if stress_pct >= self.thresholds.agency_warning_pct {
                (
                    AlertLevel::Warning,
                    format!("{agency} Warning"),
                    format!(
                        "{agency} showing elevated stress: {stress_pct:.1}% ({stressed}/{total})."
                    ),
                )
            } else {
                continue;
            };

            alerts.push(Alert {
                level,
                title,
                message,
                timestamp: now,
                agency: Some(agency),
                carpark_id: None,
                metric_value: Some(stress_pct),
            });
        }
    }

    /// Near-capacity carparks. Past the fan-out limit a single summary warning
    /// is raised; otherwise only completely full carparks get their own alert.
    fn check_critical_carparks(&self, dataset: &Dataset, now: DateTime<Utc>, alerts: &mut Vec<Alert>) {
        let limit = self.thresholds.critical_availability;
        let near_capacity: Vec<_> = dataset
            .iter()
            .filter(|r| r.available_lots <= limit)
            .collect();

        if near_capacity.len() > self.thresholds.max_individual_alerts {
            debug!(count = near_capacity.len(), "Summarizing near-capacity carparks");
            alerts.push(Alert {
                level: AlertLevel::Warning,
                title: "Multiple Carparks Near Capacity".to_string(),
                message: format!(
                    "{} carparks have <={limit} lots available.",
                    near_capacity.len()
                ),
                timestamp: now,
                agency: None,
                carpark_id: None,
                metric_value: Some(near_capacity.len() as f64),
            });
            return;
        }

        for record in near_capacity.into_iter().filter(|r| r.available_lots == 0) {
            let name: String = record.development.chars().take(30).collect();
            alerts.push(Alert {
                level: AlertLevel::Critical,
                title: format!("{name} FULL"),
                message: format!(
                    "Carpark is completely full (0 lots). Agency: {}",
                    record.agency
                ),
                timestamp: now,
                agency: Some(record.agency.clone()),
                carpark_id: Some(record.carpark_id.clone()),
                metric_value: Some(0.0),
            });
        }
    }
}
