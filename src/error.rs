use thiserror::Error;

/// Errors surfaced by the analytics core.
///
/// Data-shape problems are normalized away when a dataset is built, so these
/// only cover inputs a caller controls directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParkError {
    /// A policy intervention name that is not `pricing`, `capacity` or `mixed`.
    #[error("Unknown intervention type: {0}")]
    UnknownIntervention(String),

    /// `compare_scenarios` was handed nothing to rank.
    #[error("No scenarios to compare")]
    NoScenarios,

    /// A query argument that can never be valid (non-finite coordinates,
    /// negative radius).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
