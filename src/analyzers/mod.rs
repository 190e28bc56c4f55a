//! Availability analytics over a [`Dataset`](crate::dataset::Dataset).
//!
//! Rolls carpark records up into health scores, agency/area/lot-type
//! breakdowns, stress rankings and grid-based hot spots, and bundles them into
//! an [`AnalysisReport`](types::AnalysisReport) that can be uploaded as JSON to S3.

pub mod aggregate;
pub mod analyzer;
pub mod grade;
pub mod types;
pub mod utility;
pub mod writetos3;
