//! Attribute filtering and proximity queries over a dataset.
//!
//! Proximity is an O(n) haversine scan per query; at a few thousand rows no
//! spatial index is needed.

use serde::Serialize;

use crate::analyzers::utility::round_to;
use crate::dataset::{Agency, CarparkRecord, Dataset, LotType, Status};
use crate::error::ParkError;
use crate::geo::GeoPoint;

pub const DEFAULT_NEAREST_COUNT: usize = 10;
pub const DEFAULT_MIN_AVAILABILITY: u32 = 1;
pub const DEFAULT_RADIUS_KM: f64 = 1.0;

/// Conjunctive record filter. Every empty set or `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarparkFilter {
    /// Case-insensitive substring of the development name.
    pub query: Option<String>,
    pub agencies: Vec<Agency>,
    pub statuses: Vec<Status>,
    pub lot_types: Vec<LotType>,
    pub areas: Vec<String>,
    pub min_lots: u32,
    pub max_lots: Option<u32>,
}

impl CarparkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn agencies(mut self, agencies: impl IntoIterator<Item = Agency>) -> Self {
        self.agencies = agencies.into_iter().collect();
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn lot_types(mut self, lot_types: impl IntoIterator<Item = LotType>) -> Self {
        self.lot_types = lot_types.into_iter().collect();
        self
    }

    pub fn areas<S: Into<String>>(mut self, areas: impl IntoIterator<Item = S>) -> Self {
        self.areas = areas.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_lots(mut self, min_lots: u32) -> Self {
        self.min_lots = min_lots;
        self
    }

    pub fn max_lots(mut self, max_lots: u32) -> Self {
        self.max_lots = Some(max_lots);
        self
    }

    pub fn matches(&self, record: &CarparkRecord) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            if !record
                .development
                .to_lowercase()
                .contains(&query.to_lowercase())
            {
                return false;
            }
        }

        if !self.agencies.is_empty() && !self.agencies.contains(&record.agency) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if !self.lot_types.is_empty() && !self.lot_types.contains(&record.lot_type) {
            return false;
        }
        if !self.areas.is_empty() {
            match record.area.as_deref() {
                Some(area) if self.areas.iter().any(|a| a == area) => {}
                _ => return false,
            }
        }

        record.available_lots >= self.min_lots
            && self.max_lots.is_none_or(|max| record.available_lots <= max)
    }
}

/// Records matching `filter`, in dataset order.
pub fn search<'a>(dataset: &'a Dataset, filter: &CarparkFilter) -> Vec<&'a CarparkRecord> {
    dataset.iter().filter(|r| filter.matches(r)).collect()
}

/// A proximity hit. `distance_km` is rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyCarpark {
    pub development: String,
    pub agency: Agency,
    pub available_lots: u32,
    pub status: Status,
    pub lot_type: LotType,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// The `n` closest positioned carparks with at least `min_availability` lots,
/// optionally restricted to one agency, nearest first.
pub fn find_nearest(
    dataset: &Dataset,
    lat: f64,
    lon: f64,
    n: usize,
    min_availability: u32,
    agency: Option<&Agency>,
) -> Result<Vec<NearbyCarpark>, ParkError> {
    let origin = origin(lat, lon)?;

    let mut hits = candidates(dataset, &origin, min_availability, |r| {
        agency.is_none_or(|a| &r.agency == a)
    });
    hits.truncate(n);

    Ok(hits.into_iter().map(into_nearby).collect())
}

/// Every positioned carpark within `radius_km` with at least
/// `min_availability` lots, nearest first.
pub fn find_in_radius(
    dataset: &Dataset,
    lat: f64,
    lon: f64,
    radius_km: f64,
    min_availability: u32,
) -> Result<Vec<NearbyCarpark>, ParkError> {
    let origin = origin(lat, lon)?;
    if radius_km.is_nan() || radius_km < 0.0 {
        return Err(ParkError::InvalidQuery(format!(
            "radius must be a non-negative number of kilometres, got {radius_km}"
        )));
    }

    Ok(candidates(dataset, &origin, min_availability, |_| true)
        .into_iter()
        .take_while(|(_, _, distance)| *distance <= radius_km)
        .map(into_nearby)
        .collect())
}

fn origin(lat: f64, lon: f64) -> Result<GeoPoint, ParkError> {
    let origin = GeoPoint::new(lat, lon);
    if !origin.is_finite() {
        return Err(ParkError::InvalidQuery(format!(
            "coordinates must be finite, got ({lat}, {lon})"
        )));
    }
    Ok(origin)
}

/// Qualifying records paired with their position and unrounded distance,
/// sorted ascending. The sort is stable so equal distances keep dataset order.
fn candidates<'a>(
    dataset: &'a Dataset,
    origin: &GeoPoint,
    min_availability: u32,
    mut keep: impl FnMut(&CarparkRecord) -> bool,
) -> Vec<(&'a CarparkRecord, GeoPoint, f64)> {
    let mut hits: Vec<_> = dataset
        .iter()
        .filter(|r| r.available_lots >= min_availability && keep(r))
        .filter_map(|r| r.position().map(|p| (r, p, origin.distance_km(&p))))
        .collect();
    hits.sort_by(|a, b| a.2.total_cmp(&b.2));
    hits
}

fn into_nearby((record, position, distance): (&CarparkRecord, GeoPoint, f64)) -> NearbyCarpark {
    NearbyCarpark {
        development: record.development.clone(),
        agency: record.agency.clone(),
        available_lots: record.available_lots,
        status: record.status,
        lot_type: record.lot_type.clone(),
        latitude: position.lat,
        longitude: position.lon,
        distance_km: round_to(distance, 2),
    }
}

/// A named landmark usable as a query origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn landmark(name: &'static str, lat: f64, lon: f64) -> Landmark {
    Landmark { name, lat, lon }
}

pub static POPULAR_LOCATIONS: [Landmark; 15] = [
    landmark("Orchard Road", 1.3048, 103.8318),
    landmark("Marina Bay", 1.2814, 103.8636),
    landmark("Sentosa", 1.2494, 103.8303),
    landmark("Changi Airport", 1.3644, 103.9915),
    landmark("Jurong East", 1.3329, 103.7436),
    landmark("Tampines", 1.3496, 103.9568),
    landmark("Woodlands", 1.4382, 103.7890),
    landmark("Ang Mo Kio", 1.3691, 103.8454),
    landmark("Bugis", 1.3008, 103.8553),
    landmark("Harbourfront", 1.2644, 103.8223),
    landmark("Raffles Place", 1.2830, 103.8513),
    landmark("Chinatown", 1.2836, 103.8440),
    landmark("Little India", 1.3066, 103.8518),
    landmark("Clarke Quay", 1.2906, 103.8465),
    landmark("Dhoby Ghaut", 1.2988, 103.8456),
];

/// Case-insensitive landmark lookup.
pub fn lookup_location(name: &str) -> Option<&'static Landmark> {
    let name = name.trim();
    POPULAR_LOCATIONS
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name))
}
