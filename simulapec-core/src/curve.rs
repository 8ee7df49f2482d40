//! Rejection curves: sample size → rejection percentage (PRM).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Round a percentage to two decimals for reporting.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One point of a rejection curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub sample_size: usize,
    /// Percentage of draws that failed the test, in [0, 100].
    pub rejection_pct: f64,
}

/// Rejection percentages keyed by sample size, in grid order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RejectionCurve {
    points: Vec<CurvePoint>,
}

impl RejectionCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, sample_size: usize, rejection_pct: f64) {
        debug_assert!(self
            .points
            .last()
            .map_or(true, |p| p.sample_size <= sample_size));
        self.points.push(CurvePoint {
            sample_size,
            rejection_pct,
        });
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn sample_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.points.iter().map(|p| p.sample_size)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.rejection_pct)
    }

    /// Rejection percentage at `sample_size`, if it is on the grid.
    pub fn get(&self, sample_size: usize) -> Option<f64> {
        self.points
            .binary_search_by_key(&sample_size, |p| p.sample_size)
            .ok()
            .map(|i| self.points[i].rejection_pct)
    }

    /// Sample size → percentage rounded to two decimals.
    pub fn rounded(&self) -> BTreeMap<usize, f64> {
        self.points
            .iter()
            .map(|p| (p.sample_size, round_percent(p.rejection_pct)))
            .collect()
    }
}

/// Precision and threshold curves computed from the same draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvePair {
    pub precision: RejectionCurve,
    pub threshold: RejectionCurve,
}
