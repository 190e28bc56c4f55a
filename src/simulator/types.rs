//! Result types produced by the policy simulator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::dataset::Agency;
use crate::error::ParkError;

/// Note attached to every baseline: the capacity figure is derived, never
/// measured.
pub const CAPACITY_ASSUMPTION: &str = "Total capacity is estimated from current availability \
assuming a fixed 70% background utilization; it is a modeling assumption, not measured data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencyBaseline {
    pub agency: Agency,
    pub carparks: usize,
    pub available: u64,
    pub stressed: usize,
    pub avg_availability: f64,
}

/// Current state of the dataset, the reference point every projection is
/// measured against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub total_carparks: usize,
    pub total_capacity_estimate: u64,
    pub total_available: u64,
    /// Percent of the estimated capacity in use, one decimal.
    pub utilization_rate: f64,
    pub stressed_carparks: usize,
    pub by_agency: Vec<AgencyBaseline>,
    pub capacity_note: &'static str,
}

impl Baseline {
    pub fn agency(&self, agency: &Agency) -> Option<&AgencyBaseline> {
        self.by_agency.iter().find(|a| &a.agency == agency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Pricing,
    Capacity,
    Mixed,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Pricing => f.write_str("pricing"),
            PolicyKind::Capacity => f.write_str("capacity"),
            PolicyKind::Mixed => f.write_str("mixed"),
        }
    }
}

/// Preset interventions on the single most stressed agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Pricing,
    Capacity,
    Mixed,
}

impl InterventionKind {
    pub const ALL: [InterventionKind; 3] = [
        InterventionKind::Pricing,
        InterventionKind::Capacity,
        InterventionKind::Mixed,
    ];
}

impl FromStr for InterventionKind {
    type Err = ParkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pricing" => Ok(InterventionKind::Pricing),
            "capacity" => Ok(InterventionKind::Capacity),
            "mixed" => Ok(InterventionKind::Mixed),
            _ => Err(ParkError::UnknownIntervention(s.to_string())),
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterventionKind::Pricing => f.write_str("pricing"),
            InterventionKind::Capacity => f.write_str("capacity"),
            InterventionKind::Mixed => f.write_str("mixed"),
        }
    }
}

/// Inputs the projection was computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_change_percent: Option<f64>,
    /// `None` applies the policy to every agency.
    pub target_agency: Option<Agency>,
}

impl PolicyParameters {
    pub fn target_label(&self) -> String {
        self.target_agency
            .as_ref()
            .map_or_else(|| "All".to_string(), Agency::to_string)
    }
}

/// Figures that only one model produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ProjectionDetail {
    Pricing {
        /// Percent shift in availability of the targeted carparks.
        availability_change_percent: f64,
        /// Lots taken from the untargeted carparks by displaced demand.
        spillover_lots: u64,
    },
    Capacity {
        net_availability_change: i64,
        induced_demand: i64,
    },
    Mixed {
        agency_available: i64,
        agency_stressed_before: usize,
        agency_stressed_after: usize,
        net_improvement_percent: f64,
    },
}

/// Projected state after the policy. `stress_change` is the same field for
/// every model: projected minus baseline stressed carparks, so relief is
/// negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub total_available: i64,
    pub stressed_carparks: usize,
    pub stress_change: i64,
    pub detail: ProjectionDetail,
}

/// How a projection was computed and how far to trust it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Methodology {
    pub model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticity_used: Option<f64>,
    pub assumption: &'static str,
    pub uncertainty: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub scenario_name: String,
    pub policy_type: PolicyKind,
    pub parameters: PolicyParameters,
    pub baseline: Baseline,
    pub projected: Projection,
    pub methodology: Methodology,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// One row of a scenario comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    pub name: String,
    pub policy_type: PolicyKind,
    pub projected_available: i64,
    pub stress_change: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub scenarios_compared: usize,
    pub comparison_metrics: Vec<ScenarioMetrics>,
    /// Scenario names, most stress relief first.
    pub ranking: Vec<String>,
    pub recommendation: String,
}
