//! SimulaPEC Core — population synthesis, acceptance tests, rejection estimator.
//!
//! This crate contains the statistical engine:
//! - Fixed-seed reference populations calibrated to a tail percentage
//! - Precision (chi-square) and threshold acceptance tests
//! - Monte Carlo rejection estimator over a sample-size grid
//! - Deterministic RNG hierarchy for order-independent draws
//! - Grid and curve types handed to the runner

pub mod acceptance;
pub mod curve;
pub mod estimator;
pub mod grid;
pub mod population;
pub mod rng;

pub use acceptance::{
    chi_square_critical, precision_test, sample_std_dev, threshold_test, AcceptanceCriteria,
    AcceptanceError, PrecisionTest, ThresholdTest, ToleranceFactors, Verdict,
};
pub use curve::{round_percent, CurvePair, CurvePoint, RejectionCurve};
pub use estimator::{
    count_rejections, estimate, time_probe, EstimateError, EstimatorParams, RejectionCounts,
};
pub use grid::{sample_size_grid, tail_percent_grid, SimulationGrid};
pub use population::{
    synthesize, synthesize_with_seed, ReferencePopulation, StandardDraw, SynthesisError,
};
pub use rng::{DrawStream, RngHierarchy};
