use chrono::Utc;
use tracing::{debug, info};

use crate::analyzers::aggregate::{Rollup, group_by};
use crate::analyzers::grade::health_status;
use crate::analyzers::types::{
    AgencyComparison, AgencyStats, AnalysisReport, AreaStats, ClusterSeverity, LotTypeStats,
    OverallHealth, SpatialCluster,
};
use crate::analyzers::utility::{mean, round_to};
use crate::dataset::{CarparkRecord, Dataset};
use crate::geo::{DEFAULT_CELL_SIZE_DEG, GeoPoint, grid_cell};

pub const DEFAULT_TOP_N: usize = 20;

/// A cell needs at least this many stressed records to be reported.
pub const MIN_STRESSED_PER_CLUSTER: usize = 3;
/// Clusters with at least this many stressed records are `High` severity.
pub const HIGH_SEVERITY_STRESSED: usize = 5;
const CLUSTER_SAMPLE_NAMES: usize = 5;

const HIGH_STRESS_INSIGHT_PCT: f64 = 30.0;
const LOW_STRESS_INSIGHT_PCT: f64 = 10.0;

/// System-wide health. An empty dataset scores 0 without dividing by zero.
pub fn overall_health(dataset: &Dataset) -> OverallHealth {
    let rollup = Rollup::from_records(dataset.records());
    let health_score = rollup.health_score();

    OverallHealth {
        health_score,
        total_carparks: rollup.count,
        total_available_lots: rollup.total_lots,
        average_availability: round_to(rollup.mean, 1),
        median_availability: round_to(rollup.median, 1),
        stressed_carparks: rollup.stressed,
        moderate_carparks: rollup.moderate,
        healthy_carparks: rollup.healthy,
        stress_percentage: rollup.stress_percentage(),
        status: health_status(health_score),
    }
}

/// Per-agency rollups, in order of first appearance, each carrying its rank.
///
/// Ranks run 1..K by descending health score. Equal scores keep first-seen
/// order, so ties are broken by where the agency first shows up in the dataset.
pub fn by_agency(dataset: &Dataset) -> Vec<AgencyStats> {
    let mut stats: Vec<AgencyStats> = group_by(dataset.records(), |r| r.agency.clone())
        .into_iter()
        .map(|(agency, group)| {
            let rollup = Rollup::from_records(group);
            AgencyStats {
                agency,
                total_carparks: rollup.count,
                total_lots: rollup.total_lots,
                average_availability: round_to(rollup.mean, 1),
                median_availability: round_to(rollup.median, 1),
                min_availability: rollup.min,
                max_availability: rollup.max,
                stressed_carparks: rollup.stressed,
                stress_percentage: rollup.stress_percentage(),
                health_score: rollup.health_score(),
                rank: 0,
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..stats.len()).collect();
    order.sort_by(|&a, &b| stats[b].health_score.total_cmp(&stats[a].health_score));
    for (position, idx) in order.into_iter().enumerate() {
        stats[idx].rank = position + 1;
    }

    stats
}

/// Rollups per `Area`, restricted to records that carry one.
pub fn by_area(dataset: &Dataset) -> Vec<AreaStats> {
    let with_area = dataset.iter().filter(|r| r.area.is_some());

    group_by(with_area, |r| r.area.clone().unwrap_or_default())
        .into_iter()
        .map(|(area, group)| {
            let carpark_names = group.iter().map(|r| r.development.clone()).collect();
            let rollup = Rollup::from_records(group);
            AreaStats {
                area,
                total_carparks: rollup.count,
                total_lots: rollup.total_lots,
                average_availability: round_to(rollup.mean, 1),
                stressed_carparks: rollup.stressed,
                carpark_names,
            }
        })
        .collect()
}

/// Stressed records (`lots <= 10`) sorted ascending by lots, at most `top_n`.
///
/// When more than `top_n` records are stressed, the `top_n` with the *most*
/// lots are kept before sorting, i.e. the ones closest to the threshold win
/// over the emptiest carparks.
pub fn identify_stress_points(dataset: &Dataset, top_n: usize) -> Vec<CarparkRecord> {
    let mut stressed: Vec<&CarparkRecord> = dataset.iter().filter(|r| r.is_stressed()).collect();

    if stressed.len() > top_n {
        stressed.sort_by(|a, b| b.available_lots.cmp(&a.available_lots));
        stressed.truncate(top_n);
    }
    stressed.sort_by_key(|r| r.available_lots);

    stressed.into_iter().cloned().collect()
}

/// The `top_n` records with the most available lots, descending.
pub fn identify_high_availability(dataset: &Dataset, top_n: usize) -> Vec<CarparkRecord> {
    let mut records: Vec<&CarparkRecord> = dataset.iter().collect();
    records.sort_by(|a, b| b.available_lots.cmp(&a.available_lots));
    records.truncate(top_n);

    records.into_iter().cloned().collect()
}

pub fn by_lot_type(dataset: &Dataset) -> Vec<LotTypeStats> {
    group_by(dataset.records(), |r| r.lot_type.clone())
        .into_iter()
        .map(|(lot_type, group)| {
            let rollup = Rollup::from_records(group);
            LotTypeStats {
                name: lot_type.display_name().to_string(),
                lot_type,
                total_carparks: rollup.count,
                total_lots: rollup.total_lots,
                average_availability: round_to(rollup.mean, 1),
                stressed_count: rollup.stressed,
            }
        })
        .collect()
}

/// Grid-bucketed hot spots of stressed carparks, most stressed first.
///
/// Records without a position are skipped. A cell becomes a cluster when it
/// holds at least `min_stressed` stressed records; its centre is the mean
/// position of every record in the cell.
pub fn detect_spatial_clusters(
    dataset: &Dataset,
    cell_size_deg: f64,
    min_stressed: usize,
) -> Vec<SpatialCluster> {
    let positioned: Vec<(&CarparkRecord, GeoPoint)> = dataset
        .iter()
        .filter_map(|r| r.position().map(|p| (r, p)))
        .collect();
    let cells = group_by(&positioned, |(_, p)| grid_cell(p.lat, p.lon, cell_size_deg));

    let mut clusters: Vec<SpatialCluster> = cells
        .into_iter()
        .filter_map(|(cell, members)| {
            let group: Vec<&CarparkRecord> = members.iter().map(|(r, _)| *r).collect();
            let rollup = Rollup::from_records(group.iter().copied());
            if rollup.stressed < min_stressed {
                return None;
            }

            let lats: Vec<f64> = members.iter().map(|(_, p)| p.lat).collect();
            let lons: Vec<f64> = members.iter().map(|(_, p)| p.lon).collect();

            Some(SpatialCluster {
                cell: cell.to_string(),
                center_lat: mean(&lats),
                center_lon: mean(&lons),
                total_carparks: rollup.count,
                stressed_carparks: rollup.stressed,
                total_lots: rollup.total_lots,
                carpark_names: group
                    .iter()
                    .take(CLUSTER_SAMPLE_NAMES)
                    .map(|r| r.development.clone())
                    .collect(),
                severity: if rollup.stressed >= HIGH_SEVERITY_STRESSED {
                    ClusterSeverity::High
                } else {
                    ClusterSeverity::Moderate
                },
            })
        })
        .collect();

    clusters.sort_by(|a, b| b.stressed_carparks.cmp(&a.stressed_carparks));
    debug!(clusters = clusters.len(), cell_size_deg, "Spatial clusters detected");

    clusters
}

/// Best and worst agencies by health score plus threshold-driven insights.
pub fn compare_agencies(dataset: &Dataset) -> AgencyComparison {
    let stats = by_agency(dataset);
    if stats.is_empty() {
        return AgencyComparison::default();
    }

    let ranked = |rank: usize| {
        stats
            .iter()
            .find(|s| s.rank == rank)
            .map(|s| s.agency.clone())
    };
    let best_performer = ranked(1);
    let worst_performer = ranked(stats.len());

    let insights = stats
        .iter()
        .filter_map(|s| {
            if s.stress_percentage > HIGH_STRESS_INSIGHT_PCT {
                Some(format!(
                    "{} shows high stress with {:.1}% of carparks under pressure",
                    s.agency, s.stress_percentage
                ))
            } else if s.stress_percentage < LOW_STRESS_INSIGHT_PCT {
                Some(format!(
                    "{} is performing well with only {:.1}% stressed carparks",
                    s.agency, s.stress_percentage
                ))
            } else {
                None
            }
        })
        .collect();

    AgencyComparison {
        best_performer,
        worst_performer,
        insights,
    }
}

/// Bundles every analysis with default parameters.
pub fn generate_report(dataset: &Dataset) -> AnalysisReport {
    let report = AnalysisReport {
        timestamp: Utc::now(),
        overall_health: overall_health(dataset),
        agency_analysis: by_agency(dataset),
        area_analysis: by_area(dataset),
        lot_type_analysis: by_lot_type(dataset),
        stress_points: identify_stress_points(dataset, DEFAULT_TOP_N),
        high_availability: identify_high_availability(dataset, DEFAULT_TOP_N),
        spatial_clusters: detect_spatial_clusters(
            dataset,
            DEFAULT_CELL_SIZE_DEG,
            MIN_STRESSED_PER_CLUSTER,
        ),
        agency_comparison: compare_agencies(dataset),
    };

    info!(
        carparks = report.overall_health.total_carparks,
        health_score = report.overall_health.health_score,
        status = %report.overall_health.status,
        clusters = report.spatial_clusters.len(),
        "Analysis report generated"
    );

    report
}
