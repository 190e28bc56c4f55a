//! Result types produced by the analytics engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::analyzers::grade::HealthStatus;
use crate::dataset::{Agency, CarparkRecord, LotType};

/// System-wide availability health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallHealth {
    pub health_score: f64,
    pub total_carparks: usize,
    pub total_available_lots: u64,
    pub average_availability: f64,
    pub median_availability: f64,
    pub stressed_carparks: usize,
    pub moderate_carparks: usize,
    pub healthy_carparks: usize,
    pub stress_percentage: f64,
    pub status: HealthStatus,
}

/// Per-agency rollup with its rank by health score (1 = healthiest).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencyStats {
    pub agency: Agency,
    pub total_carparks: usize,
    pub total_lots: u64,
    pub average_availability: f64,
    pub median_availability: f64,
    pub min_availability: u32,
    pub max_availability: u32,
    pub stressed_carparks: usize,
    pub stress_percentage: f64,
    pub health_score: f64,
    pub rank: usize,
}

/// Rollup of records sharing one `Area` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStats {
    pub area: String,
    pub total_carparks: usize,
    pub total_lots: u64,
    pub average_availability: f64,
    pub stressed_carparks: usize,
    pub carpark_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotTypeStats {
    pub lot_type: LotType,
    pub name: String,
    pub total_carparks: usize,
    pub total_lots: u64,
    pub average_availability: f64,
    pub stressed_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterSeverity {
    High,
    Moderate,
}

impl fmt::Display for ClusterSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterSeverity::High => f.write_str("High"),
            ClusterSeverity::Moderate => f.write_str("Moderate"),
        }
    }
}

/// A grid cell holding enough stressed carparks to count as a hot spot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialCluster {
    /// `"<lat_idx>_<lon_idx>"` key of the grid cell.
    pub cell: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub total_carparks: usize,
    pub stressed_carparks: usize,
    pub total_lots: u64,
    /// Up to five development names, in dataset order.
    pub carpark_names: Vec<String>,
    pub severity: ClusterSeverity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgencyComparison {
    pub best_performer: Option<Agency>,
    pub worst_performer: Option<Agency>,
    pub insights: Vec<String>,
}

/// Everything the analytics engine knows about one dataset, bundled for
/// downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub overall_health: OverallHealth,
    pub agency_analysis: Vec<AgencyStats>,
    pub area_analysis: Vec<AreaStats>,
    pub lot_type_analysis: Vec<LotTypeStats>,
    pub stress_points: Vec<CarparkRecord>,
    pub high_availability: Vec<CarparkRecord>,
    pub spatial_clusters: Vec<SpatialCluster>,
    pub agency_comparison: AgencyComparison,
}
