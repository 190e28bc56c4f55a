use serde::Serialize;
use std::fmt;

/// Label attached to a 0–100 health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Moderate,
    Stressed,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Moderate => "Moderate",
            HealthStatus::Stressed => "Stressed",
            HealthStatus::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// Converts a health score (0–100) into a status label.
///
/// | Range  | Status    |
/// |--------|-----------|
/// | >= 80  | Excellent |
/// | >= 60  | Good      |
/// | >= 40  | Moderate  |
/// | >= 20  | Stressed  |
/// | < 20   | Critical  |
pub fn health_status(score: f64) -> HealthStatus {
    match score {
        s if s >= 80.0 => HealthStatus::Excellent,
        s if s >= 60.0 => HealthStatus::Good,
        s if s >= 40.0 => HealthStatus::Moderate,
        s if s >= 20.0 => HealthStatus::Stressed,
        _ => HealthStatus::Critical,
    }
}
