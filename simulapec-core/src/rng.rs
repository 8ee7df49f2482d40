//! Deterministic RNG hierarchy for sample draws.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(stream, sample_size, iteration)` tuple. Sub-seeds are derived via BLAKE3
//! hashing, independently of thread scheduling order, so rejection curves are
//! identical regardless of how many threads evaluate the iterations.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Default master seed for sample draws.
pub const DEFAULT_SAMPLING_SEED: u64 = 42;

/// Deterministic RNG hierarchy.
///
/// The master seed is expanded into per-(stream, sample size, iteration)
/// sub-seeds using BLAKE3. Because derivation is hash-based (not
/// order-dependent), the same master seed produces identical sub-seeds no
/// matter which iteration a worker thread picks up first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a specific (stream, sample size, iteration).
    pub fn sub_seed(&self, stream: &str, sample_size: usize, iteration: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(&(stream.len() as u64).to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&(sample_size as u64).to_le_bytes());
        hasher.update(&iteration.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, stream: &str, sample_size: usize, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, sample_size, iteration))
    }

    /// Bind this hierarchy to a named stream (one per grid row, probe, or overlay).
    pub fn stream(&self, label: impl Into<String>) -> DrawStream {
        DrawStream {
            hierarchy: *self,
            label: label.into(),
        }
    }
}

/// A labelled slice of the hierarchy used by one estimator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawStream {
    hierarchy: RngHierarchy,
    label: String,
}

impl DrawStream {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rng_for(&self, sample_size: usize, iteration: u64) -> StdRng {
        self.hierarchy.rng_for(&self.label, sample_size, iteration)
    }
}
