// Minimization: forward then backward determinization over pushed weights.

use wfsm_semiring::DivisibleSemiring;

use crate::Result;
use crate::config::MinimizeConfig;
use crate::connect::connect;
use crate::determinize::{Direction, determinize};
use crate::fsm::Fsm;
use crate::nil::eliminate_nil_states;
use crate::normalize::renormalize;
use crate::paths::topological_order;
use crate::push::push_weights;

/// Minimize an acyclic FSM, returning a new one.
///
/// Pipeline on a copy of the input:
///
/// 1. prune to the trim part (`config.prune`)
/// 2. eliminate nil states (`config.eliminate_nils`)
/// 3. push weights toward the initial states
/// 4. determinize forward, merging shared prefixes
/// 5. determinize backward, merging shared suffixes
/// 6. push again, then renormalize
///
/// The backward pass yields the smallest automaton with no two predecessors
/// of a state sharing a label, which can still be larger than an input that
/// was forward-deterministic to begin with. In that case the pruned, pushed
/// and renormalized input from step 3 is returned instead, so the state
/// count never grows.
///
/// Label-sequence weights come out divided by the total accepting mass of
/// the input, so a normalized input keeps them unchanged.
///
/// Cyclic input is rejected with [`FsmError::Cyclic`](crate::FsmError::Cyclic)
/// and a bad `delta` with [`FsmError::InvalidDelta`](crate::FsmError::InvalidDelta),
/// both before anything runs.
pub fn minimize<W: DivisibleSemiring>(fsm: &Fsm<W>, config: &MinimizeConfig) -> Result<Fsm<W>> {
    config.determinize.validate()?;
    topological_order(fsm)?;

    let mut work = fsm.clone();
    if config.prune {
        connect(&mut work);
    }
    if config.eliminate_nils {
        eliminate_nil_states(&mut work);
    }
    push_weights(&mut work)?;

    let prefixes = determinize(&work, Direction::Forward, &config.determinize)?;
    let mut out = determinize(&prefixes, Direction::Backward, &config.determinize)?;
    let kept_input = out.num_states() > work.num_states();
    if kept_input {
        out = work;
        out.compact();
    }
    push_weights(&mut out)?;
    renormalize(&mut out);

    tracing::debug!(
        states_in = fsm.num_states(),
        after_forward = prefixes.num_states(),
        states_out = out.num_states(),
        arcs_out = out.num_arcs(),
        kept_input,
        "minimize"
    );
    Ok(out)
}
