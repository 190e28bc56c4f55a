//! Normalized carpark table built from one fetch.
//!
//! A [`Dataset`] is rebuilt wholesale from raw records on every successful fetch
//! and is read-only afterwards. Malformed raw fields never fail the build: lot
//! counts that cannot be parsed become `0` and unparsable locations leave the
//! record without coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::analyzers::aggregate::group_by;
use crate::analyzers::utility::{mean, round_to};
use crate::geo::GeoPoint;

/// Records with at most this many lots are "stressed".
pub const STRESS_THRESHOLD: u32 = 10;
/// Records with more than this many lots are "healthy".
pub const MODERATE_THRESHOLD: u32 = 50;

/// The parking authority a carpark belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agency {
    /// Housing & Development Board.
    Hdb,
    /// Land Transport Authority.
    Lta,
    /// Urban Redevelopment Authority.
    Ura,
    Other(String),
}

impl Agency {
    pub fn as_str(&self) -> &str {
        match self {
            Agency::Hdb => "HDB",
            Agency::Lta => "LTA",
            Agency::Ura => "URA",
            Agency::Other(code) => code,
        }
    }
}

impl From<&str> for Agency {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "HDB" => Agency::Hdb,
            "LTA" => Agency::Lta,
            "URA" => Agency::Ura,
            _ => Agency::Other(s.trim().to_string()),
        }
    }
}

impl FromStr for Agency {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Agency::from(s))
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Agency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Agency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Agency::from(s.as_str()))
    }
}

/// Kind of vehicle a lot count refers to. Unknown codes pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LotType {
    Car,
    HeavyVehicle,
    Motorcycle,
    Other(String),
}

impl LotType {
    /// Single-letter source code (`C`, `H`, `Y`).
    pub fn code(&self) -> &str {
        match self {
            LotType::Car => "C",
            LotType::HeavyVehicle => "H",
            LotType::Motorcycle => "Y",
            LotType::Other(code) => code,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            LotType::Car => "Cars",
            LotType::HeavyVehicle => "Heavy Vehicles",
            LotType::Motorcycle => "Motorcycles",
            LotType::Other(code) => code,
        }
    }
}

impl From<&str> for LotType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "C" => LotType::Car,
            "H" => LotType::HeavyVehicle,
            "Y" => LotType::Motorcycle,
            other => LotType::Other(other.to_string()),
        }
    }
}

impl FromStr for LotType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LotType::from(s))
    }
}

impl fmt::Display for LotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for LotType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for LotType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(LotType::from(s.as_str()))
    }
}

/// Availability band of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Available,
    Moderate,
    Limited,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Available, Status::Moderate, Status::Limited];

    /// `>50` Available, `>10` Moderate, otherwise Limited.
    pub fn from_lots(lots: u32) -> Self {
        if lots > MODERATE_THRESHOLD {
            Status::Available
        } else if lots > STRESS_THRESHOLD {
            Status::Moderate
        } else {
            Status::Limited
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Available => "Available",
            Status::Moderate => "Moderate",
            Status::Limited => "Limited",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Status::Available),
            "moderate" => Ok(Status::Moderate),
            "limited" => Ok(Status::Limited),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record as delivered by the availability API, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCarpark {
    #[serde(rename = "CarParkID")]
    pub carpark_id: serde_json::Value,
    #[serde(rename = "Area", deserialize_with = "lenient_text")]
    pub area: Option<String>,
    #[serde(rename = "Development", deserialize_with = "lenient_text")]
    pub development: Option<String>,
    #[serde(rename = "Location", deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(rename = "AvailableLots")]
    pub available_lots: serde_json::Value,
    #[serde(rename = "LotType", deserialize_with = "lenient_text")]
    pub lot_type: Option<String>,
    #[serde(rename = "Agency", deserialize_with = "lenient_text")]
    pub agency: Option<String>,
}

/// Text fields tolerate numbers (kept as their JSON text); any other type is
/// treated as missing rather than failing the record.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A normalized carpark row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarparkRecord {
    pub carpark_id: String,
    pub development: String,
    pub agency: Agency,
    pub area: Option<String>,
    pub lot_type: LotType,
    pub available_lots: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Status,
    pub fetch_time: DateTime<Utc>,
}

impl CarparkRecord {
    pub fn from_raw(raw: RawCarpark, fetch_time: DateTime<Utc>) -> Self {
        let (latitude, longitude) = parse_location(raw.location.as_deref());
        let available_lots = coerce_lots(&raw.available_lots);
        let agency = Agency::from(raw.agency.as_deref().unwrap_or_default());
        let lot_type = LotType::from(raw.lot_type.as_deref().unwrap_or_default());

        Self {
            carpark_id: value_to_string(&raw.carpark_id),
            development: raw.development.unwrap_or_default(),
            agency,
            area: raw.area.filter(|a| !a.trim().is_empty()),
            lot_type,
            available_lots,
            latitude,
            longitude,
            status: Status::from_lots(available_lots),
            fetch_time,
        }
    }

    /// Coordinates, only when both halves parsed. Records without a position
    /// are left out of every spatial operation.
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(GeoPoint::new(lat, lon))
            }
            _ => None,
        }
    }

    pub fn is_stressed(&self) -> bool {
        self.available_lots <= STRESS_THRESHOLD
    }
}

/// Splits a `"lat lon"` string. Each half parses independently.
fn parse_location(location: Option<&str>) -> (Option<f64>, Option<f64>) {
    let Some(location) = location.filter(|l| l.contains(' ')) else {
        return (None, None);
    };
    let mut parts = location.split(' ');
    let lat = parts.next().and_then(|p| p.parse::<f64>().ok());
    let lon = parts.next().and_then(|p| p.parse::<f64>().ok());
    (lat, lon)
}

/// Numbers and numeric strings are accepted; anything else (or a negative) is 0.
fn coerce_lots(value: &serde_json::Value) -> u32 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v.min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Per-agency block of a [`DatasetSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgencySummary {
    pub agency: Agency,
    pub carparks: usize,
    pub available_lots: u64,
    pub avg_availability: f64,
}

/// Per-lot-type block of a [`DatasetSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotTypeSummary {
    pub lot_type: LotType,
    pub carparks: usize,
    pub available_lots: u64,
}

/// Count of records per [`Status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub available: usize,
    pub moderate: usize,
    pub limited: usize,
}

impl StatusCounts {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Available => self.available,
            Status::Moderate => self.moderate,
            Status::Limited => self.limited,
        }
    }
}

/// Headline numbers for one fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_carparks: usize,
    pub total_available_lots: u64,
    pub by_agency: Vec<AgencySummary>,
    pub by_lot_type: Vec<LotTypeSummary>,
    pub by_status: StatusCounts,
    pub fetch_time: DateTime<Utc>,
}

/// Immutable collection of records sharing one fetch time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    fetch_time: DateTime<Utc>,
    records: Vec<CarparkRecord>,
}

impl Dataset {
    pub fn from_raw(raw: Vec<RawCarpark>, fetch_time: DateTime<Utc>) -> Self {
        let records: Vec<CarparkRecord> = raw
            .into_iter()
            .map(|r| CarparkRecord::from_raw(r, fetch_time))
            .collect();

        let without_position = records.iter().filter(|r| r.position().is_none()).count();
        debug!(
            records = records.len(),
            without_position, "Dataset built from raw records"
        );

        Self {
            fetch_time,
            records,
        }
    }

    /// Wraps already-normalized records. Each record is restamped with `fetch_time`
    /// and its status recomputed.
    pub fn from_records(records: Vec<CarparkRecord>, fetch_time: DateTime<Utc>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                r.fetch_time = fetch_time;
                r.status = Status::from_lots(r.available_lots);
                r
            })
            .collect();
        Self {
            fetch_time,
            records,
        }
    }

    pub fn empty(fetch_time: DateTime<Utc>) -> Self {
        Self {
            fetch_time,
            records: Vec::new(),
        }
    }

    pub fn fetch_time(&self) -> DateTime<Utc> {
        self.fetch_time
    }

    pub fn records(&self) -> &[CarparkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CarparkRecord> {
        self.records.iter()
    }

    pub fn total_available(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.available_lots)).sum()
    }

    pub fn stressed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_stressed()).count()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for r in &self.records {
            match r.status {
                Status::Available => counts.available += 1,
                Status::Moderate => counts.moderate += 1,
                Status::Limited => counts.limited += 1,
            }
        }
        counts
    }

    pub fn agency<'a>(&'a self, agency: &'a Agency) -> impl Iterator<Item = &'a CarparkRecord> {
        self.records.iter().filter(move |r| &r.agency == agency)
    }

    pub fn area<'a>(&'a self, area: &'a str) -> impl Iterator<Item = &'a CarparkRecord> {
        self.records
            .iter()
            .filter(move |r| r.area.as_deref() == Some(area))
    }

    pub fn summary(&self) -> DatasetSummary {
        let by_agency = group_by(&self.records, |r| r.agency.clone())
            .into_iter()
            .map(|(agency, group)| {
                let lots: Vec<f64> = group.iter().map(|r| f64::from(r.available_lots)).collect();
                AgencySummary {
                    agency,
                    carparks: group.len(),
                    available_lots: group.iter().map(|r| u64::from(r.available_lots)).sum(),
                    avg_availability: round_to(mean(&lots), 1),
                }
            })
            .collect();

        let by_lot_type = group_by(&self.records, |r| r.lot_type.clone())
            .into_iter()
            .map(|(lot_type, group)| LotTypeSummary {
                lot_type,
                carparks: group.len(),
                available_lots: group.iter().map(|r| u64::from(r.available_lots)).sum(),
            })
            .collect();

        DatasetSummary {
            total_carparks: self.len(),
            total_available_lots: self.total_available(),
            by_agency,
            by_lot_type,
            by_status: self.status_counts(),
            fetch_time: self.fetch_time,
        }
    }
}
