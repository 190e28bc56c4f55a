//! Bounded in-memory history of availability snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::debug;

use crate::analyzers::aggregate::{Rollup, group_by};
use crate::analyzers::utility::round_to;
use crate::dataset::{Agency, CarparkRecord, Dataset, StatusCounts};

/// One hour of history at a one-minute sampling cadence.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 60;
const SNAPSHOT_RANKING_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencySnapshot {
    pub agency: Agency,
    pub available: u64,
    pub carparks: usize,
    pub stressed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCarpark {
    pub development: String,
    pub agency: Agency,
    pub available_lots: u32,
}

impl From<&CarparkRecord> for RankedCarpark {
    fn from(record: &CarparkRecord) -> Self {
        Self {
            development: record.development.clone(),
            agency: record.agency.clone(),
            available_lots: record.available_lots,
        }
    }
}

/// Aggregate capture of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub total_carparks: usize,
    pub total_available: u64,
    pub by_agency: Vec<AgencySnapshot>,
    pub by_status: StatusCounts,
    pub stressed_count: usize,
    pub top_available: Vec<RankedCarpark>,
    pub most_stressed: Vec<RankedCarpark>,
}

impl Snapshot {
    /// Captures `dataset`, stamped with its fetch time.
    pub fn capture(dataset: &Dataset) -> Self {
        let by_agency = group_by(dataset.records(), |r| r.agency.clone())
            .into_iter()
            .map(|(agency, group)| {
                let rollup = Rollup::from_records(group);
                AgencySnapshot {
                    agency,
                    available: rollup.total_lots,
                    carparks: rollup.count,
                    stressed: rollup.stressed,
                }
            })
            .collect();

        let mut ranked: Vec<&CarparkRecord> = dataset.iter().collect();
        ranked.sort_by(|a, b| b.available_lots.cmp(&a.available_lots));
        let top_available = ranked
            .iter()
            .take(SNAPSHOT_RANKING_SIZE)
            .map(|r| RankedCarpark::from(*r))
            .collect();

        let mut emptiest: Vec<&CarparkRecord> = dataset.iter().collect();
        emptiest.sort_by_key(|r| r.available_lots);
        let most_stressed = emptiest
            .iter()
            .take(SNAPSHOT_RANKING_SIZE)
            .map(|r| RankedCarpark::from(*r))
            .collect();

        Snapshot {
            timestamp: dataset.fetch_time(),
            total_carparks: dataset.len(),
            total_available: dataset.total_available(),
            by_agency,
            by_status: dataset.status_counts(),
            stressed_count: dataset.stressed_count(),
            top_available,
            most_stressed,
        }
    }

    pub fn agency(&self, agency: &Agency) -> Option<&AgencySnapshot> {
        self.by_agency.iter().find(|a| &a.agency == agency)
    }

    /// Flattens the snapshot into one CSV row. Agencies other than the three
    /// pooled ones are counted only in the totals.
    pub fn to_row(&self) -> SnapshotRow {
        let available = |agency: Agency| self.agency(&agency).map_or(0, |a| a.available);
        let stressed = |agency: Agency| self.agency(&agency).map_or(0, |a| a.stressed);

        SnapshotRow {
            timestamp: self.timestamp,
            total_carparks: self.total_carparks,
            total_available: self.total_available,
            stressed_count: self.stressed_count,
            available_status: self.by_status.available,
            moderate_status: self.by_status.moderate,
            limited_status: self.by_status.limited,
            hdb_available: available(Agency::Hdb),
            hdb_stressed: stressed(Agency::Hdb),
            lta_available: available(Agency::Lta),
            lta_stressed: stressed(Agency::Lta),
            ura_available: available(Agency::Ura),
            ura_stressed: stressed(Agency::Ura),
        }
    }
}

/// Flat form of a [`Snapshot`] for CSV history files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub timestamp: DateTime<Utc>,
    pub total_carparks: usize,
    pub total_available: u64,
    pub stressed_count: usize,
    pub available_status: usize,
    pub moderate_status: usize,
    pub limited_status: usize,
    pub hdb_available: u64,
    pub hdb_stressed: usize,
    pub lta_available: u64,
    pub lta_stressed: usize,
    pub ura_available: u64,
    pub ura_stressed: usize,
}

/// Per-agency values inside a [`TrendPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgencyTrendValue {
    pub available: u64,
    pub stressed: usize,
}

/// One row of the flattened trend table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub total_available: u64,
    pub stressed_count: usize,
    pub by_agency: BTreeMap<String, AgencyTrendValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn from_change(change: i64) -> Self {
        match change {
            c if c > 0 => TrendDirection::Increasing,
            c if c < 0 => TrendDirection::Decreasing,
            _ => TrendDirection::Stable,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "↑",
            TrendDirection::Decreasing => "↓",
            TrendDirection::Stable => "→",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => f.write_str("increasing"),
            TrendDirection::Decreasing => f.write_str("decreasing"),
            TrendDirection::Stable => f.write_str("stable"),
        }
    }
}

/// First-vs-last change in total available lots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AvailabilityChange {
    pub change: i64,
    /// Percent change, two decimals; 0 when the first total was 0.
    pub percent: f64,
    pub direction: TrendDirection,
    /// Number of snapshots held. Equals minutes only under a one-minute
    /// sampling cadence; no wall-clock time is measured.
    pub time_span_minutes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencyTrend {
    pub agency: Agency,
    pub start: u64,
    pub current: u64,
    pub change: i64,
    pub trend: TrendDirection,
}

/// Size-bounded FIFO of snapshots; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct HistoricalTracker {
    max_snapshots: usize,
    snapshots: VecDeque<Snapshot>,
}

impl Default for HistoricalTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl HistoricalTracker {
    /// A buffer holding at most `max_snapshots` entries (at least one).
    pub fn new(max_snapshots: usize) -> Self {
        let max_snapshots = max_snapshots.max(1);
        Self {
            max_snapshots,
            snapshots: VecDeque::with_capacity(max_snapshots.saturating_add(1)),
        }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Captures and appends a snapshot of `dataset`, returning it.
    pub fn add_snapshot(&mut self, dataset: &Dataset) -> &Snapshot {
        self.push(Snapshot::capture(dataset))
    }

    /// Appends an already-captured snapshot, evicting from the front until the
    /// buffer is back within `max_snapshots`.
    pub fn push(&mut self, snapshot: Snapshot) -> &Snapshot {
        self.snapshots.push_back(snapshot);

        while self.snapshots.len() > self.max_snapshots {
            if let Some(evicted) = self.snapshots.pop_front() {
                debug!(timestamp = %evicted.timestamp, "Evicted oldest snapshot");
            }
        }

        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Time-ordered projection of the buffer for charting.
    pub fn trend_series(&self) -> Vec<TrendPoint> {
        self.snapshots
            .iter()
            .map(|snap| TrendPoint {
                timestamp: snap.timestamp,
                total_available: snap.total_available,
                stressed_count: snap.stressed_count,
                by_agency: snap
                    .by_agency
                    .iter()
                    .map(|a| {
                        (
                            a.agency.to_string(),
                            AgencyTrendValue {
                                available: a.available,
                                stressed: a.stressed,
                            },
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn availability_change(&self) -> AvailabilityChange {
        let (Some(first), Some(last)) = (self.snapshots.front(), self.snapshots.back()) else {
            return AvailabilityChange::stable(0);
        };
        if self.snapshots.len() < 2 {
            return AvailabilityChange::stable(self.snapshots.len());
        }

        let change = last.total_available as i64 - first.total_available as i64;
        let percent = if first.total_available > 0 {
            round_to(change as f64 / first.total_available as f64 * 100.0, 2)
        } else {
            0.0
        };

        AvailabilityChange {
            change,
            percent,
            direction: TrendDirection::from_change(change),
            time_span_minutes: self.snapshots.len(),
        }
    }

    /// First-vs-last available lots for each agency in the latest snapshot.
    /// An agency missing from the first snapshot starts at 0.
    pub fn agency_trends(&self) -> Vec<AgencyTrend> {
        if self.snapshots.len() < 2 {
            return Vec::new();
        }
        let (Some(first), Some(last)) = (self.snapshots.front(), self.snapshots.back()) else {
            return Vec::new();
        };

        last.by_agency
            .iter()
            .map(|current| {
                let start = first.agency(&current.agency).map_or(0, |a| a.available);
                let change = current.available as i64 - start as i64;
                AgencyTrend {
                    agency: current.agency.clone(),
                    start,
                    current: current.available,
                    change,
                    trend: TrendDirection::from_change(change),
                }
            })
            .collect()
    }
}

impl AvailabilityChange {
    fn stable(snapshots: usize) -> Self {
        Self {
            change: 0,
            percent: 0.0,
            direction: TrendDirection::Stable,
            time_span_minutes: snapshots,
        }
    }
}
