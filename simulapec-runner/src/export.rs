//! Result export: JSON and long-format CSV.
//!
//! - **JSON**: full `SimulationResult` round-trip with schema versioning
//! - **CSV**: one line per (source, tail percentage, sample size) with both
//!   rejection percentages rounded to two decimals
//!
//! Unknown schema versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::result::{RowResult, SimulationResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `SimulationResult` to pretty JSON.
pub fn export_json(result: &SimulationResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize SimulationResult to JSON")
}

/// Deserialize a `SimulationResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<SimulationResult> {
    let result: SimulationResult =
        serde_json::from_str(json).context("failed to deserialize SimulationResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export rows as long-format CSV.
///
/// Columns: source, tail_percent, sample_size, prm_precision, prm_threshold
pub fn export_rows_csv<'a>(rows: impl IntoIterator<Item = &'a RowResult>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "source",
        "tail_percent",
        "sample_size",
        "prm_precision",
        "prm_threshold",
    ])?;

    for row in rows {
        for line in row.table() {
            wtr.write_record([
                row.source.as_str(),
                &row.tail_percent.to_string(),
                &line.sample_size.to_string(),
                &format!("{:.2}", line.prm_precision),
                &format!("{:.2}", line.prm_threshold),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// CSV table for a completed run: synthetic rows, then the overlay.
pub fn export_table_csv(result: &SimulationResult) -> Result<String> {
    export_rows_csv(result.all_rows())
}

// ─── Files ──────────────────────────────────────────────────────────

pub fn save_json(result: &SimulationResult, path: &Path) -> Result<()> {
    let json = export_json(result)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn load_json(path: &Path) -> Result<SimulationResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

pub fn save_csv(result: &SimulationResult, path: &Path) -> Result<()> {
    let csv = export_table_csv(result)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::result::{PopulationSource, TimeEstimate};
    use chrono::Utc;
    use simulapec_core::{estimate, EstimatorParams, RngHierarchy, SimulationGrid, ToleranceFactors};

    fn result() -> SimulationResult {
        let grid = SimulationGrid::new(20, 5, 10);
        let population: Vec<f64> = (0..20).map(|i| (i as f64 - 10.0) / 1.5).collect();
        let row = |source, tail: u32| {
            let params = EstimatorParams {
                n_iterations: 25,
                admissible_error: 5.0,
                limit_percent: f64::from(tail),
                factors: ToleranceFactors::default(),
            };
            RowResult {
                source,
                tail_percent: tail,
                curves: estimate(
                    &population,
                    &grid.sample_sizes,
                    &params,
                    &RngHierarchy::new(5).stream(format!("t{tail}")),
                    None,
                )
                .unwrap(),
            }
        };
        SimulationResult {
            schema_version: SCHEMA_VERSION,
            config: SimulationConfig::default(),
            estimate: TimeEstimate::from_probe(0.01, 2),
            rows: vec![
                row(PopulationSource::Synthetic, 5),
                row(PopulationSource::Synthetic, 10),
            ],
            overlay: Some(row(PopulationSource::Real, 10)),
            grid,
            elapsed_secs: 0.2,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let saved = result();
        let json = export_json(&saved).unwrap();
        assert!(json.contains("\"schema_version\": 1"));
        let back = import_json(&json).unwrap();
        assert_eq!(back.rows, saved.rows);
        assert_eq!(back.overlay, saved.overlay);
        assert_eq!(back.grid, saved.grid);
        assert_eq!(back.finished_at, saved.finished_at);
    }

    #[test]
    fn future_schema_rejected() {
        let mut future = result();
        future.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&future).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn csv_is_long_format_with_overlay_last() {
        let csv = export_table_csv(&result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "source,tail_percent,sample_size,prm_precision,prm_threshold"
        );
        // 20 × 0.6 = 12 → sizes [5, 10]; three rows of two lines each
        assert_eq!(lines.len(), 1 + 3 * 2);
        assert!(lines[1].starts_with("synthetic,5,5,"));
        assert!(lines[4].starts_with("synthetic,10,10,"));
        assert!(lines[5].starts_with("real,10,5,"));
        for line in &lines[1..] {
            let prm: f64 = line.rsplit(',').next().unwrap().parse().unwrap();
            assert!((0.0..=100.0).contains(&prm));
        }
    }

    #[test]
    fn files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let saved = result();
        let json_path = dir.path().join("result.json");
        let csv_path = dir.path().join("result.csv");
        save_json(&saved, &json_path).unwrap();
        save_csv(&saved, &csv_path).unwrap();
        assert_eq!(load_json(&json_path).unwrap().rows, saved.rows);
        assert!(std::fs::read_to_string(&csv_path)
            .unwrap()
            .starts_with("source,"));
    }
}
