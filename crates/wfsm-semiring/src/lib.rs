//! Semiring weights for weighted finite-state machines.
//!
//! Every algorithm in `wfsm` is generic over the [`Semiring`] capability set
//! defined here, so any numeric weight representation that satisfies the
//! laws can be plugged in.
//!
//! # Architecture
//!
//! - [`semiring`] -- The capability traits and the stable `logaddexp`
//! - [`log`] -- Log semiring (reference instantiation, value = ln p)
//! - [`tropical`] -- Tropical (min, +) semiring over costs
//! - [`real`] -- Plain probabilities under (+, ×)

pub mod log;
pub mod real;
pub mod semiring;
pub mod tropical;

pub use log::LogWeight;
pub use real::RealWeight;
pub use semiring::{
    DivisibleSemiring, FloatWeight, ProbabilityWeight, QUANTIZE_RANGE, Semiring, logaddexp,
};
pub use tropical::TropicalWeight;
