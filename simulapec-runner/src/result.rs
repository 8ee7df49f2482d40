//! Run results: one row per tail percentage plus the optional real-data overlay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use simulapec_core::{round_percent, CurvePair, SimulationGrid};

use crate::config::SimulationConfig;

/// Current schema version for persisted results.
/// Bump when the `SimulationResult` layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Where a row's population came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationSource {
    Synthetic,
    Real,
}

impl PopulationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PopulationSource::Synthetic => "synthetic",
            PopulationSource::Real => "real",
        }
    }
}

/// Advisory run-time estimate: probe time × number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub probe_secs: f64,
    pub rows: usize,
    pub total_secs: f64,
}

impl TimeEstimate {
    pub fn from_probe(probe_secs: f64, rows: usize) -> Self {
        Self {
            probe_secs,
            rows,
            total_secs: probe_secs * rows as f64,
        }
    }
}

/// One reporting line: both rejection percentages at one sample size, rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableLine {
    pub sample_size: usize,
    pub prm_precision: f64,
    pub prm_threshold: f64,
}

/// Both rejection curves for one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    pub source: PopulationSource,
    /// Tail percentage the population was calibrated to (the rejection
    /// limit of the row). For the overlay, the base tail percentage.
    pub tail_percent: u32,
    pub curves: CurvePair,
}

impl RowResult {
    /// Rows of (sample size, PRM precision, PRM threshold), rounded to two decimals.
    pub fn table(&self) -> Vec<TableLine> {
        self.curves
            .precision
            .points()
            .iter()
            .zip(self.curves.threshold.points())
            .map(|(p, t)| TableLine {
                sample_size: p.sample_size,
                prm_precision: round_percent(p.rejection_pct),
                prm_threshold: round_percent(t.rejection_pct),
            })
            .collect()
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub schema_version: u32,
    pub config: SimulationConfig,
    pub grid: SimulationGrid,
    pub estimate: TimeEstimate,
    /// Synthetic rows in ascending tail-percentage order.
    pub rows: Vec<RowResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<RowResult>,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl SimulationResult {
    /// Row for `tail_percent`, if it was on the grid.
    pub fn row(&self, tail_percent: u32) -> Option<&RowResult> {
        self.rows.iter().find(|r| r.tail_percent == tail_percent)
    }

    /// Synthetic rows followed by the overlay.
    pub fn all_rows(&self) -> impl Iterator<Item = &RowResult> {
        self.rows.iter().chain(self.overlay.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulapec_core::{estimate, EstimatorParams, RngHierarchy, ToleranceFactors};

    fn row(tail_percent: u32) -> RowResult {
        let population: Vec<f64> = (0..60).map(|i| (i as f64 - 30.0) / 4.0).collect();
        let params = EstimatorParams {
            n_iterations: 30,
            admissible_error: 5.0,
            limit_percent: f64::from(tail_percent),
            factors: ToleranceFactors::default(),
        };
        let curves = estimate(
            &population,
            &[5, 10, 15],
            &params,
            &RngHierarchy::new(3).stream("row"),
            None,
        )
        .unwrap();
        RowResult {
            source: PopulationSource::Synthetic,
            tail_percent,
            curves,
        }
    }

    #[test]
    fn table_pairs_both_curves_by_sample_size() {
        let row = row(10);
        let table = row.table();
        assert_eq!(
            table.iter().map(|l| l.sample_size).collect::<Vec<_>>(),
            vec![5, 10, 15]
        );
        for (line, (p, t)) in table.iter().zip(
            row.curves
                .precision
                .values()
                .zip(row.curves.threshold.values()),
        ) {
            assert_eq!(line.prm_precision, round_percent(p));
            assert_eq!(line.prm_threshold, round_percent(t));
        }
    }

    #[test]
    fn estimate_scales_probe_by_rows() {
        let e = TimeEstimate::from_probe(0.25, 12);
        assert_eq!(e.total_secs, 3.0);
        assert_eq!(e.rows, 12);
    }

    #[test]
    fn source_labels() {
        assert_eq!(PopulationSource::Synthetic.as_str(), "synthetic");
        assert_eq!(PopulationSource::Real.as_str(), "real");
        assert_eq!(
            serde_json::to_string(&PopulationSource::Real).unwrap(),
            "\"real\""
        );
    }

    #[test]
    fn lookup_and_iteration_include_overlay() {
        let result = SimulationResult {
            schema_version: SCHEMA_VERSION,
            config: SimulationConfig::default(),
            grid: SimulationGrid::new(25, 2, 4),
            estimate: TimeEstimate::from_probe(0.1, 2),
            rows: vec![row(2), row(4)],
            overlay: Some(RowResult {
                source: PopulationSource::Real,
                ..row(10)
            }),
            elapsed_secs: 0.5,
            finished_at: Utc::now(),
        };
        assert!(result.row(4).is_some());
        assert!(result.row(6).is_none());
        let sources: Vec<_> = result.all_rows().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![
                PopulationSource::Synthetic,
                PopulationSource::Synthetic,
                PopulationSource::Real
            ]
        );
    }
}
