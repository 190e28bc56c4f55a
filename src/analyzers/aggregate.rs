use crate::analyzers::utility::{mean, median, pct, round_to};
use crate::dataset::{CarparkRecord, MODERATE_THRESHOLD, STRESS_THRESHOLD};

/// Groups items by key, keeping groups in order of first appearance and items
/// in their original order within each group.
pub fn group_by<'a, T, K, F>(items: impl IntoIterator<Item = &'a T>, mut key: F) -> Vec<(K, Vec<&'a T>)>
where
    T: 'a,
    K: PartialEq,
    F: FnMut(&T) -> K,
{
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();

    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }

    groups
}

/// Availability statistics over any group of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rollup {
    pub count: usize,
    pub total_lots: u64,
    pub mean: f64,
    pub median: f64,
    pub min: u32,
    pub max: u32,
    /// `lots <= 10`
    pub stressed: usize,
    /// `10 < lots <= 50`
    pub moderate: usize,
    /// `lots > 50`
    pub healthy: usize,
}

impl Rollup {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CarparkRecord>) -> Self {
        let lots: Vec<u32> = records.into_iter().map(|r| r.available_lots).collect();
        let as_f64: Vec<f64> = lots.iter().map(|&l| f64::from(l)).collect();

        Rollup {
            count: lots.len(),
            total_lots: lots.iter().map(|&l| u64::from(l)).sum(),
            mean: mean(&as_f64),
            median: median(&as_f64),
            min: lots.iter().copied().min().unwrap_or(0),
            max: lots.iter().copied().max().unwrap_or(0),
            stressed: lots.iter().filter(|&&l| l <= STRESS_THRESHOLD).count(),
            moderate: lots
                .iter()
                .filter(|&&l| l > STRESS_THRESHOLD && l <= MODERATE_THRESHOLD)
                .count(),
            healthy: lots.iter().filter(|&&l| l > MODERATE_THRESHOLD).count(),
        }
    }

    /// Share of healthy records, 0–100, one decimal.
    pub fn health_score(&self) -> f64 {
        round_to(pct(self.healthy, self.count), 1)
    }

    /// Share of stressed records, 0–100, one decimal.
    pub fn stress_percentage(&self) -> f64 {
        round_to(pct(self.stressed, self.count), 1)
    }
}
