//! Simulation configuration: user fields, TOML files, validation.
//!
//! Six scalars come from the user (population size, admissible error, base
//! tail percentage, maximum tail percentage, interval, iterations). Parsing
//! and validation collect every problem before failing, so the caller gets
//! one aggregated `ConfigError` and never a partially applied config.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use simulapec_core::grid::{sample_size_grid, MIN_SAMPLE_SIZE};
use simulapec_core::population::DEFAULT_REFERENCE_SEED;
use simulapec_core::rng::DEFAULT_SAMPLING_SEED;
use simulapec_core::{EstimatorParams, SimulationGrid, ToleranceFactors};

// ─── Errors ──────────────────────────────────────────────────────────

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(FieldIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration errors. Field problems are always reported together.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", join_issues(.0))]
    Invalid(Vec<FieldIssue>),

    #[error("failed to read config file {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to parse config TOML: {0}")]
    Toml(String),
}

impl ConfigError {
    /// Field issues, empty for I/O and TOML errors.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

// ─── Raw user fields ─────────────────────────────────────────────────

/// The six user-entered fields, as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFields {
    pub population_size: String,
    pub admissible_error: String,
    pub base_tail_percent: String,
    pub max_tail_percent: String,
    pub tail_interval: String,
    pub n_iterations: String,
}

impl Default for RawFields {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for RawFields {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            population_size: config.population_size.to_string(),
            admissible_error: config.admissible_error.to_string(),
            base_tail_percent: config.base_tail_percent.to_string(),
            max_tail_percent: config.max_tail_percent.to_string(),
            tail_interval: config.tail_interval.to_string(),
            n_iterations: config.n_iterations.to_string(),
        }
    }
}

/// Parse an integer field. `domain` names the accepted values in the message.
fn parse_integer<T: std::str::FromStr>(
    field: &'static str,
    domain: &str,
    raw: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            issues.push(FieldIssue::new(
                field,
                format!("expected {domain}, got '{}'", raw.trim()),
            ));
            None
        }
    }
}

fn parse_decimal(field: &'static str, raw: &str, issues: &mut Vec<FieldIssue>) -> Option<f64> {
    match raw.trim().replace(',', ".").parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            issues.push(FieldIssue::new(
                field,
                format!("expected a decimal number, got '{}'", raw.trim()),
            ));
            None
        }
    }
}

/// Field order used when reporting issues.
const USER_FIELDS: [&str; 6] = [
    "population_size",
    "admissible_error",
    "base_tail_percent",
    "max_tail_percent",
    "tail_interval",
    "n_iterations",
];

fn field_rank(field: &str) -> usize {
    USER_FIELDS
        .iter()
        .position(|f| *f == field)
        .unwrap_or(USER_FIELDS.len())
}

/// The six user fields after parsing; `None` where the text was rejected.
#[derive(Debug, Clone, Copy)]
struct ParsedFields {
    population_size: Option<usize>,
    admissible_error: Option<f64>,
    base_tail_percent: Option<u32>,
    max_tail_percent: Option<u32>,
    tail_interval: Option<u32>,
    n_iterations: Option<usize>,
}

impl ParsedFields {
    fn parse(raw: &RawFields, issues: &mut Vec<FieldIssue>) -> Self {
        const PERCENT: &str = "a whole percentage between 0 and 100";
        const POSITIVE: &str = "a positive whole number";
        Self {
            population_size: parse_integer(
                "population_size",
                "a whole number of errors",
                &raw.population_size,
                issues,
            ),
            admissible_error: parse_decimal("admissible_error", &raw.admissible_error, issues),
            base_tail_percent: parse_integer(
                "base_tail_percent",
                PERCENT,
                &raw.base_tail_percent,
                issues,
            ),
            max_tail_percent: parse_integer(
                "max_tail_percent",
                PERCENT,
                &raw.max_tail_percent,
                issues,
            ),
            tail_interval: parse_integer("tail_interval", POSITIVE, &raw.tail_interval, issues),
            n_iterations: parse_integer("n_iterations", POSITIVE, &raw.n_iterations, issues),
        }
    }

    /// Range checks on every field that parsed. A field that failed to
    /// parse is skipped; the cross-field check needs both of its fields.
    fn range_issues(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        if let Some(n) = self.population_size {
            if sample_size_grid(n).is_empty() {
                issues.push(FieldIssue::new(
                    "population_size",
                    format!(
                        "{n} is too small: the sample grid starts at {MIN_SAMPLE_SIZE} and stops at 60% of the population"
                    ),
                ));
            }
        }
        if let Some(e) = self.admissible_error {
            if !(e.is_finite() && e > 0.0) {
                issues.push(FieldIssue::new(
                    "admissible_error",
                    format!("must be positive, got {e}"),
                ));
            }
        }
        for (field, value) in [
            ("base_tail_percent", self.base_tail_percent),
            ("max_tail_percent", self.max_tail_percent),
        ] {
            if let Some(p) = value.filter(|&p| p > 100) {
                issues.push(FieldIssue::new(field, format!("must lie in 0..=100, got {p}")));
            }
        }
        match (self.tail_interval, self.max_tail_percent) {
            (Some(0), _) => issues.push(FieldIssue::new("tail_interval", "must be at least 1")),
            (Some(step), Some(max)) if max < step => issues.push(FieldIssue::new(
                "max_tail_percent",
                format!("must be at least the interval ({step}), got {max}"),
            )),
            _ => {}
        }
        if self.n_iterations == Some(0) {
            issues.push(FieldIssue::new("n_iterations", "must be at least 1"));
        }

        issues.sort_by_key(|issue| field_rank(issue.field));
        issues
    }
}

impl From<&SimulationConfig> for ParsedFields {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            population_size: Some(config.population_size),
            admissible_error: Some(config.admissible_error),
            base_tail_percent: Some(config.base_tail_percent),
            max_tail_percent: Some(config.max_tail_percent),
            tail_interval: Some(config.tail_interval),
            n_iterations: Some(config.n_iterations),
        }
    }
}

// ─── Validated configuration ─────────────────────────────────────────

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // ── User fields ──
    /// Population size `N`.
    pub population_size: usize,
    /// Admissible error `ε`.
    pub admissible_error: f64,
    /// Tail percentage for the time probe and the real-data overlay.
    pub base_tail_percent: u32,
    /// Largest tail percentage on the grid.
    pub max_tail_percent: u32,
    /// Step between tail percentages.
    pub tail_interval: u32,
    /// Draws per sample size.
    pub n_iterations: usize,

    // ── Seeding ──
    pub reference_seed: u64,
    pub sampling_seed: u64,

    // ── Threading ──
    pub threads: usize,

    // ── Test conventions ──
    pub factors: ToleranceFactors,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_size: 600,
            admissible_error: 5.0,
            base_tail_percent: 10,
            max_tail_percent: 24,
            tail_interval: 2,
            n_iterations: 300,
            reference_seed: DEFAULT_REFERENCE_SEED,
            sampling_seed: DEFAULT_SAMPLING_SEED,
            threads: 1,
            factors: ToleranceFactors::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse the six user fields on top of `base` (seeds, threads, factors).
    pub fn from_fields_with(base: &SimulationConfig, raw: &RawFields) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let parsed = ParsedFields::parse(raw, &mut issues);
        issues.extend(parsed.range_issues());
        issues.sort_by_key(|issue| field_rank(issue.field));
        issues.extend(base.extra_issues());

        match parsed {
            ParsedFields {
                population_size: Some(n),
                admissible_error: Some(e),
                base_tail_percent: Some(p0),
                max_tail_percent: Some(pmax),
                tail_interval: Some(step),
                n_iterations: Some(iters),
            } if issues.is_empty() => Ok(SimulationConfig {
                population_size: n,
                admissible_error: e,
                base_tail_percent: p0,
                max_tail_percent: pmax,
                tail_interval: step,
                n_iterations: iters,
                ..base.clone()
            }),
            _ => Err(ConfigError::Invalid(issues)),
        }
    }

    /// Parse the six user fields with default seeds, threads and factors.
    pub fn from_fields(raw: &RawFields) -> Result<Self, ConfigError> {
        Self::from_fields_with(&SimulationConfig::default(), raw)
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig =
            toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    fn issues(&self) -> Vec<FieldIssue> {
        let mut issues = ParsedFields::from(self).range_issues();
        issues.extend(self.extra_issues());
        issues
    }

    /// Checks on the settings that never come from the user fields.
    fn extra_issues(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        if self.threads == 0 {
            issues.push(FieldIssue::new("threads", "must be at least 1"));
        }
        for (field, value) in [
            ("factors.standard_error", self.factors.standard_error),
            ("factors.threshold", self.factors.threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                issues.push(FieldIssue::new(field, format!("must be positive, got {value}")));
            }
        }
        issues
    }

    /// Check every field; all problems are reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    pub fn grid(&self) -> SimulationGrid {
        SimulationGrid::new(self.population_size, self.tail_interval, self.max_tail_percent)
    }

    /// Estimator parameters for a row whose rejection limit is `limit_percent`.
    pub fn estimator_params(&self, limit_percent: u32) -> EstimatorParams {
        EstimatorParams {
            n_iterations: self.n_iterations,
            admissible_error: self.admissible_error,
            limit_percent: f64::from(limit_percent),
            factors: self.factors,
        }
    }
}
