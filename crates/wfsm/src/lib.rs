//! Weighted finite-state machine construction and transformation.
//!
//! This crate builds weighted FSMs over any semiring from `wfsm-semiring`
//! (canonically the log semiring) and transforms them structurally: union,
//! concatenation, nil-state elimination, weight pushing, reachability
//! pruning, determinization, minimization, renormalization, transpose, and
//! hierarchical substitution of labeled states by sub-automata.
//!
//! Searching or decoding over the resulting automaton is left to the
//! consumer; [`table`] exports a packed form for that purpose.
//!
//! # Architecture
//!
//! - [`fsm`] -- Data model: state arena, per-state adjacency, builders
//! - [`config`] -- Determinization and minimization settings
//! - [`combine`] -- Union and concatenation
//! - [`nil`] -- Nil (epsilon) state elimination
//! - [`connect`] -- Forward/backward reachability pruning
//! - [`push`] -- Weight pushing toward the initial states
//! - [`normalize`] -- Renormalization and self-loop insertion
//! - [`transpose`] -- Arc reversal
//! - [`determinize`] -- Weighted subset construction in either direction
//! - [`minimize`] -- Reversal-based minimization pipeline
//! - [`replace`] -- Hierarchical substitution (replace / compose)
//! - [`paths`] -- Topological order and path-weight utilities
//! - [`table`] -- Packed arc table for decoders

pub mod combine;
pub mod config;
pub mod connect;
pub mod determinize;
pub mod fsm;
pub mod minimize;
pub mod nil;
pub mod normalize;
pub mod paths;
pub mod push;
pub mod replace;
#[cfg(feature = "serde")]
mod serde_impl;
pub mod table;
pub mod transpose;

pub use combine::{concat, union};
pub use config::{DeterminizeConfig, MinimizeConfig};
pub use connect::{accessible, coaccessible, connect};
pub use determinize::{Direction, determinize, is_deterministic};
pub use fsm::{Fsm, StateId, StateRef, StateSpec, Transition};
pub use minimize::minimize;
pub use nil::eliminate_nil_states;
pub use normalize::{add_self_loop, add_self_loops, renormalize};
pub use paths::{is_acyclic, sequence_weights, topological_order, total_weight};
pub use push::push_weights;
pub use replace::{compose, replace};
pub use table::{ArcTable, PackedArc, PackedState};
pub use transpose::transpose;

pub use hashbrown::HashMap;

pub use wfsm_semiring::{
    DivisibleSemiring, FloatWeight, LogWeight, ProbabilityWeight, RealWeight, Semiring,
    TropicalWeight,
};

/// Error type for FSM construction and transformation.
#[derive(Debug, thiserror::Error)]
pub enum FsmError {
    #[error("state {0} belongs to a different automaton")]
    ForeignState(StateId),
    #[error("state {0} has been removed")]
    RemovedState(StateId),
    #[error("automaton has a cycle through state {state}; operation requires acyclic input")]
    Cyclic { state: StateId },
    #[error("substitution for label `{label}` expands into itself")]
    RecursiveSubstitution { label: String },
    #[error("determinization exceeded the limit of {limit} states")]
    StateLimitExceeded { limit: usize },
    #[error("invalid quantization step {0}: expected a finite value above zero")]
    InvalidDelta(f64),
    #[error("invalid probability {0}: expected a value in [0, 1)")]
    InvalidProbability(f64),
    #[error("invalid arc table: {0}")]
    InvalidTable(String),
}

pub type Result<T> = std::result::Result<T, FsmError>;
