//! Reference population synthesis.
//!
//! A seeded standard-normal draw is scaled so that its calibration element
//! (the `k`-th largest absolute value, `k = ⌊n · tail / 100⌋`) lands exactly
//! on the admissible error. Every grid row reuses the same draw with a
//! different scale, which keeps rows statistically comparable.
//!
//! Key design choices:
//! - The seed is fixed per run (`reference_seed`, default 0).
//! - The signed draw is scaled, not its absolute values.
//! - A degenerate calibration index or a zero calibration value is an error,
//!   never a silently clamped result.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed of the reference standard-normal draw.
pub const DEFAULT_REFERENCE_SEED: u64 = 0;

/// Errors from population synthesis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthesisError {
    #[error("invalid configuration: population needs at least one point")]
    EmptyPopulation,

    #[error("invalid configuration: admissible error must be positive and finite, got {0}")]
    InvalidAdmissibleError(f64),

    #[error(
        "invalid configuration: tail {tail_percent}% of {n_points} points gives calibration \
         index {index}, expected 1..={n_points}"
    )]
    InvalidConfiguration {
        n_points: usize,
        tail_percent: f64,
        index: usize,
    },

    #[error("division by zero: calibration value at index {index} is zero")]
    DivisionByZero { index: usize },
}

// ─── Standard draw ───────────────────────────────────────────────────

/// A seeded standard-normal draw, sorted once for calibration.
#[derive(Debug, Clone)]
pub struct StandardDraw {
    seed: u64,
    values: Vec<f64>,
    abs_descending: Vec<f64>,
}

impl StandardDraw {
    /// Draw `n_points` independent N(0, 1) values from `seed`.
    pub fn generate(n_points: usize, seed: u64) -> Result<Self, SynthesisError> {
        if n_points == 0 {
            return Err(SynthesisError::EmptyPopulation);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let values: Vec<f64> = (0..n_points)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();

        let mut abs_descending: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        abs_descending.sort_by(|a, b| b.total_cmp(a));

        Ok(Self {
            seed,
            values,
            abs_descending,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 1-based calibration index `k = ⌊n · tail / 100⌋`, validated against the draw size.
    pub fn calibration_index(&self, tail_percent: f64) -> Result<usize, SynthesisError> {
        let n_points = self.values.len();
        let raw = (n_points as f64 * tail_percent / 100.0).floor();
        let index = if raw.is_finite() && raw > 0.0 {
            raw as usize
        } else {
            0
        };

        if index < 1 || index > n_points {
            return Err(SynthesisError::InvalidConfiguration {
                n_points,
                tail_percent,
                index,
            });
        }
        Ok(index)
    }

    /// Scale the draw so the `tail_percent`-th largest |value| equals `admissible_error`.
    pub fn calibrate(
        &self,
        admissible_error: f64,
        tail_percent: f64,
    ) -> Result<ReferencePopulation, SynthesisError> {
        if !(admissible_error.is_finite() && admissible_error > 0.0) {
            return Err(SynthesisError::InvalidAdmissibleError(admissible_error));
        }

        let index = self.calibration_index(tail_percent)?;
        let calibration = self.abs_descending[index - 1];
        if calibration == 0.0 {
            return Err(SynthesisError::DivisionByZero { index });
        }

        let mut scale = admissible_error / calibration;
        if !scale.is_finite() {
            return Err(SynthesisError::DivisionByZero { index });
        }
        // Rounding can leave calibration * scale one ulp short of the target.
        while calibration * scale < admissible_error {
            scale = f64::from_bits(scale.to_bits() + 1);
        }

        Ok(ReferencePopulation {
            values: self.values.iter().map(|v| v * scale).collect(),
            admissible_error,
            tail_percent,
            calibration_index: index,
            scale,
        })
    }
}

// ─── Calibrated population ───────────────────────────────────────────

/// A calibrated reference population. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePopulation {
    values: Vec<f64>,
    admissible_error: f64,
    tail_percent: f64,
    calibration_index: usize,
    scale: f64,
}

impl ReferencePopulation {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn admissible_error(&self) -> f64 {
        self.admissible_error
    }

    pub fn tail_percent(&self) -> f64 {
        self.tail_percent
    }

    pub fn calibration_index(&self) -> usize {
        self.calibration_index
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of values with `|v| >= threshold`.
    pub fn count_at_or_above(&self, threshold: f64) -> usize {
        self.values.iter().filter(|v| v.abs() >= threshold).count()
    }
}

/// Synthesize a reference population from the default fixed seed.
pub fn synthesize(
    n_points: usize,
    admissible_error: f64,
    tail_percent: f64,
) -> Result<ReferencePopulation, SynthesisError> {
    synthesize_with_seed(n_points, admissible_error, tail_percent, DEFAULT_REFERENCE_SEED)
}

/// Synthesize a reference population from an explicit seed.
pub fn synthesize_with_seed(
    n_points: usize,
    admissible_error: f64,
    tail_percent: f64,
    seed: u64,
) -> Result<ReferencePopulation, SynthesisError> {
    StandardDraw::generate(n_points, seed)?.calibrate(admissible_error, tail_percent)
}
