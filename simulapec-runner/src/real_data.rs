//! Real error lists loaded from text files.
//!
//! One decimal per line; `,` and `.` are both accepted as the decimal
//! separator and blank lines are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RealDataError {
    #[error("line {line}: cannot parse '{text}' as a decimal number")]
    Parse { line: usize, text: String },

    #[error("line {line}: value {value} is not finite")]
    NonFinite { line: usize, value: f64 },

    #[error("real-data input contains no values")]
    Empty,

    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// A user-supplied population of measured errors, in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealPopulation {
    values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<PathBuf>,
}

impl RealPopulation {
    pub fn new(values: Vec<f64>) -> Result<Self, RealDataError> {
        if values.is_empty() {
            return Err(RealDataError::Empty);
        }
        Ok(Self {
            values,
            source: None,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// File the values were read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Parse an error list. Line numbers in errors are 1-based.
pub fn parse_real_data(text: &str) -> Result<RealPopulation, RealDataError> {
    let mut values = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line = i + 1;
        let value: f64 = trimmed
            .replace(',', ".")
            .parse()
            .map_err(|_| RealDataError::Parse {
                line,
                text: trimmed.to_string(),
            })?;
        if !value.is_finite() {
            return Err(RealDataError::NonFinite { line, value });
        }
        values.push(value);
    }
    RealPopulation::new(values)
}

/// Read and parse an error list from `path`.
pub fn load_real_data(path: &Path) -> Result<RealPopulation, RealDataError> {
    let text = std::fs::read_to_string(path).map_err(|e| RealDataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut population = parse_real_data(&text)?;
    population.source = Some(path.to_path_buf());
    Ok(population)
}
