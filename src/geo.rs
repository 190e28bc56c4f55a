//! Geographic helpers: great-circle distance and fixed-size grid bucketing.
//!
//! The grid is a coarse locality key, not a spatial index. Cells are formed by
//! truncating `coord / cell_size` toward zero, so cells straddling the equator or
//! the prime meridian are wider than the others.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used by [`haversine`], in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default grid cell edge, in degrees (roughly 1 km at the equator).
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.01;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Distance to `other` in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Composite key of a grid cell. Displays as `"<lat_idx>_<lon_idx>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridCell {
    pub lat_idx: i64,
    pub lon_idx: i64,
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lat_idx, self.lon_idx)
    }
}

/// Buckets a point into a grid cell of `cell_size_deg` degrees.
pub fn grid_cell(lat: f64, lon: f64, cell_size_deg: f64) -> GridCell {
    GridCell {
        lat_idx: (lat / cell_size_deg) as i64,
        lon_idx: (lon / cell_size_deg) as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine(1.3521, 103.8198, 1.3521, 103.8198), 0.0);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let ab = haversine(1.3521, 103.8198, 1.2814, 103.8636);
        let ba = haversine(1.2814, 103.8636, 1.3521, 103.8198);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_known_pair() {
        let d = haversine(1.3521, 103.8198, 1.2814, 103.8636);
        // Singapore centre to Marina Bay.
        assert!((d - 9.247).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let d = haversine(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_grid_cell_truncates() {
        let cell = grid_cell(1.35219, 103.81987, 0.01);
        assert_eq!(cell, GridCell { lat_idx: 135, lon_idx: 10381 });
        assert_eq!(cell.to_string(), "135_10381");
    }

    #[test]
    fn test_grid_cell_same_cell_for_close_points() {
        assert_eq!(
            grid_cell(1.3001, 103.8001, 0.01),
            grid_cell(1.3099, 103.8099, 0.01)
        );
        assert_ne!(
            grid_cell(1.3099, 103.8099, 0.01),
            grid_cell(1.3101, 103.8099, 0.01)
        );
    }

    #[test]
    fn test_grid_cell_truncates_toward_zero_for_negatives() {
        assert_eq!(grid_cell(-0.005, 0.005, 0.01), grid_cell(0.005, -0.005, 0.01));
    }

    #[test]
    fn test_geo_point_distance() {
        let a = GeoPoint::new(1.3048, 103.8318);
        assert_eq!(a.distance_km(&a), 0.0);
        assert!(a.is_finite());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_finite());
    }
}
