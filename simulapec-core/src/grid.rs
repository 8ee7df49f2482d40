//! Simulation grid: tail percentages × sample sizes.

use serde::{Deserialize, Serialize};

/// Smallest sample size on the grid.
pub const MIN_SAMPLE_SIZE: usize = 5;

/// Step between consecutive sample sizes.
pub const SAMPLE_SIZE_STEP: usize = 5;

/// Largest sample as a fraction of the population, `numerator / denominator` (0.6).
pub const MAX_SAMPLE_FRACTION: (usize, usize) = (3, 5);

/// Largest sample size for a population of `population_size` (`⌊0.6 · N⌋`).
pub fn max_sample_size(population_size: usize) -> usize {
    let (num, den) = MAX_SAMPLE_FRACTION;
    population_size.saturating_mul(num) / den
}

/// `[5, 10, …, ⌊0.6 · N⌋]`. Empty when `N` is too small to hold a 5-element sample.
pub fn sample_size_grid(population_size: usize) -> Vec<usize> {
    (MIN_SAMPLE_SIZE..=max_sample_size(population_size))
        .step_by(SAMPLE_SIZE_STEP)
        .collect()
}

/// `[interval, 2·interval, …]` up to and including `max` when it falls on the step.
pub fn tail_percent_grid(interval: u32, max: u32) -> Vec<u32> {
    if interval == 0 {
        return Vec::new();
    }
    (interval..=max).step_by(interval as usize).collect()
}

/// The cross-product the run controller iterates. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationGrid {
    pub tail_percents: Vec<u32>,
    pub sample_sizes: Vec<usize>,
}

impl SimulationGrid {
    pub fn new(population_size: usize, tail_interval: u32, max_tail_percent: u32) -> Self {
        Self {
            tail_percents: tail_percent_grid(tail_interval, max_tail_percent),
            sample_sizes: sample_size_grid(population_size),
        }
    }

    /// Number of tail-percentage rows.
    pub fn rows(&self) -> usize {
        self.tail_percents.len()
    }

    /// Number of (row, sample size) cells.
    pub fn cells(&self) -> usize {
        self.tail_percents.len() * self.sample_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tail_percents.is_empty() || self.sample_sizes.is_empty()
    }
}
