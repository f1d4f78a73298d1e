// Topological order and accepting-path weight utilities.
//
// These exist to validate transformations on acyclic graphs. They enumerate
// label sequences exhaustively and are not a decoder.

use std::collections::VecDeque;

use hashbrown::HashMap;
use wfsm_semiring::Semiring;

use crate::fsm::{Fsm, StateId};
use crate::{FsmError, Result};

/// Live states in an order where every arc points forward.
///
/// Fails with [`FsmError::Cyclic`] naming a state on (or behind) a cycle.
/// Self-loops count as cycles.
pub fn topological_order<W: Semiring>(fsm: &Fsm<W>) -> Result<Vec<StateId>> {
    let order = kahn(fsm, None).map_err(|s| FsmError::Cyclic { state: fsm.id(s) })?;
    Ok(order.into_iter().map(|s| fsm.id(s)).collect())
}

pub fn is_acyclic<W: Semiring>(fsm: &Fsm<W>) -> bool {
    kahn(fsm, None).is_ok()
}

/// ⊕-sum of the weights of all accepting paths, grouped by the sequence of
/// labels the path visits. Unlabeled states contribute nothing to the
/// sequence.
///
/// Requires an acyclic FSM. The number of sequences can be exponential in
/// the number of states.
pub fn sequence_weights<W: Semiring>(fsm: &Fsm<W>) -> Result<HashMap<Vec<String>, W>> {
    let order = kahn(fsm, None).map_err(|s| FsmError::Cyclic { state: fsm.id(s) })?;
    let mut prefixes: Vec<HashMap<Vec<String>, W>> = vec![HashMap::new(); fsm.capacity()];
    let mut result: HashMap<Vec<String>, W> = HashMap::new();

    for s in order {
        let node = fsm.node(s);
        if !node.init_weight.is_zero() {
            let seq: Vec<String> = node.label.iter().cloned().collect();
            accumulate(&mut prefixes[s as usize], seq, node.init_weight);
        }

        let current = std::mem::take(&mut prefixes[s as usize]);
        if current.is_empty() {
            continue;
        }
        if !node.final_weight.is_zero() {
            for (seq, w) in &current {
                accumulate(&mut result, seq.clone(), w.times(&node.final_weight));
            }
        }
        for &(d, aw) in &node.arcs {
            let label = fsm.node(d).label.as_ref();
            for (seq, w) in &current {
                let mut next = seq.clone();
                next.extend(label.cloned());
                accumulate(&mut prefixes[d as usize], next, w.times(&aw));
            }
        }
    }
    Ok(result)
}

/// ⊕-sum of the weights of all accepting paths. Requires an acyclic FSM.
pub fn total_weight<W: Semiring>(fsm: &Fsm<W>) -> Result<W> {
    let order = kahn(fsm, None).map_err(|s| FsmError::Cyclic { state: fsm.id(s) })?;
    let mut alpha = vec![W::zero(); fsm.capacity()];
    let mut total = W::zero();
    for s in order {
        let node = fsm.node(s);
        let a = alpha[s as usize].plus(&node.init_weight);
        total = total.plus(&a.times(&node.final_weight));
        for &(d, w) in &node.arcs {
            alpha[d as usize] = alpha[d as usize].plus(&a.times(&w));
        }
    }
    Ok(total)
}

fn accumulate<W: Semiring>(map: &mut HashMap<Vec<String>, W>, key: Vec<String>, w: W) {
    if w.is_zero() {
        return;
    }
    map.entry(key)
        .and_modify(|acc| *acc = acc.plus(&w))
        .or_insert(w);
}

/// Kahn's algorithm over the live states selected by `mask` (all when
/// `None`). Arcs from unselected states are ignored.
///
/// On a cycle returns the lowest-indexed selected state left unordered.
pub(crate) fn kahn<W: Semiring>(
    fsm: &Fsm<W>,
    mask: Option<&[bool]>,
) -> std::result::Result<Vec<u32>, u32> {
    let selected = |s: u32| mask.is_none_or(|m| m[s as usize]);
    let mut indegree = vec![0usize; fsm.capacity()];
    let mut total = 0;
    for s in fsm.live_indices().filter(|&s| selected(s)) {
        total += 1;
        for &(d, _) in &fsm.node(s).arcs {
            indegree[d as usize] += 1;
        }
    }

    let mut queue: VecDeque<u32> = fsm
        .live_indices()
        .filter(|&s| selected(s) && indegree[s as usize] == 0)
        .collect();
    let mut order = Vec::with_capacity(total);
    while let Some(s) = queue.pop_front() {
        order.push(s);
        for &(d, _) in &fsm.node(s).arcs {
            indegree[d as usize] -= 1;
            if indegree[d as usize] == 0 {
                queue.push_back(d);
            }
        }
    }

    if order.len() == total {
        return Ok(order);
    }
    let stuck = fsm
        .live_indices()
        .find(|&s| selected(s) && indegree[s as usize] > 0)
        .unwrap_or(0);
    Err(stuck)
}
