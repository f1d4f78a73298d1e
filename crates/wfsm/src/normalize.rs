// Renormalization and self-loop insertion.

use wfsm_semiring::{DivisibleSemiring, ProbabilityWeight, Semiring};

use crate::fsm::{Fsm, StateId};
use crate::{FsmError, Result};

/// Renormalize in place so every distribution the FSM encodes sums to `one`.
///
/// Initial weights are divided by their ⊕-sum. For each state, every outgoing
/// arc weight and the final weight are divided by the ⊕-sum of the final
/// weight and all outgoing arc weights. A state whose exits sum to `zero`
/// keeps `zero` everywhere: division by `zero` yields `zero`.
pub fn renormalize<W: DivisibleSemiring>(fsm: &mut Fsm<W>) {
    let states: Vec<u32> = fsm.live_indices().collect();

    let init_total = states
        .iter()
        .fold(W::zero(), |acc, &s| acc.plus(&fsm.node(s).init_weight));
    for &s in &states {
        let node = fsm.node_mut(s);
        node.init_weight = node.init_weight.divide(&init_total);

        let total = node
            .arcs
            .iter()
            .fold(node.final_weight, |acc, (_, w)| acc.plus(w));
        for (_, w) in node.arcs.iter_mut() {
            *w = w.divide(&total);
        }
        node.final_weight = node.final_weight.divide(&total);
    }
    tracing::debug!(states = states.len(), "renormalize");
}

/// Give `state` a self-loop taken with probability `loop_probability`.
///
/// Every existing exit of the state (outgoing arcs, including an existing
/// loop, and the final weight) is scaled by `1 - loop_probability` before the
/// loop is appended, so a stochastic state stays stochastic.
pub fn add_self_loop<W: ProbabilityWeight>(
    fsm: &mut Fsm<W>,
    state: StateId,
    loop_probability: f64,
) -> Result<()> {
    let s = fsm.check(state)?;
    let (stay, leave) = loop_weights::<W>(loop_probability)?;
    scale_exits(fsm, s, &leave);
    fsm.push_arc(s, s, stay);
    Ok(())
}

/// [`add_self_loop`] on every emitting state. Returns the number of loops
/// added.
pub fn add_self_loops<W: ProbabilityWeight>(fsm: &mut Fsm<W>, loop_probability: f64) -> Result<usize> {
    let (stay, leave) = loop_weights::<W>(loop_probability)?;
    let emitting: Vec<u32> = fsm
        .live_indices()
        .filter(|&s| fsm.node(s).pdf_index.is_some())
        .collect();
    for &s in &emitting {
        scale_exits(fsm, s, &leave);
        fsm.push_arc(s, s, stay);
    }
    tracing::debug!(loops = emitting.len(), loop_probability, "add_self_loops");
    Ok(emitting.len())
}

fn loop_weights<W: ProbabilityWeight>(p: f64) -> Result<(W, W)> {
    if !(0.0..1.0).contains(&p) {
        return Err(FsmError::InvalidProbability(p));
    }
    let stay = W::from_probability(p);
    Ok((stay, stay.complement()))
}

fn scale_exits<W: Semiring>(fsm: &mut Fsm<W>, s: u32, factor: &W) {
    let node = fsm.node_mut(s);
    for (_, w) in node.arcs.iter_mut() {
        *w = w.times(factor);
    }
    node.final_weight = node.final_weight.times(factor);
}
