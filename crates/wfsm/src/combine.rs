// Union and concatenation of whole automata.

use wfsm_semiring::Semiring;

use crate::fsm::{Fsm, Node, StateSpec};

/// Disjoint union of `fsms`.
///
/// Each input is copied verbatim into a fresh FSM: the state and arc counts
/// of the result are the sums of the inputs', no arc joins two different
/// inputs' copies, and every initial and final weight is preserved.
pub fn union<W: Semiring>(fsms: &[&Fsm<W>]) -> Fsm<W> {
    let mut out = Fsm::new();
    for fsm in fsms {
        out.absorb(fsm);
    }
    tracing::debug!(
        inputs = fsms.len(),
        states = out.num_states(),
        arcs = out.num_arcs(),
        "union"
    );
    out
}

/// Concatenation of `fsms` in order.
///
/// Between each consecutive pair a non-emitting, unlabeled connector state is
/// inserted. Every final state of the left operand gets an arc into the
/// connector weighted by its final weight, and the connector gets an arc to
/// every initial state of the right operand weighted by that initial weight.
/// Those boundary weights move onto the connector arcs, so the result's
/// initial states are the first operand's and its final states the last's.
pub fn concat<W: Semiring>(fsms: &[&Fsm<W>]) -> Fsm<W> {
    let mut out = Fsm::new();
    let Some((first, rest)) = fsms.split_first() else {
        return out;
    };

    let map = out.absorb(first);
    let mut left_finals = boundary(&out, first, &map, |n| n.final_weight);

    for fsm in rest {
        let map = out.absorb(fsm);
        let right_inits = boundary(&out, fsm, &map, |n| n.init_weight);
        let connector = out.push_node(Node::from_spec(StateSpec::new()));

        for &(s, weight) in &left_finals {
            out.push_arc(s, connector, weight);
            out.node_mut(s).final_weight = W::zero();
        }
        for &(s, weight) in &right_inits {
            out.push_arc(connector, s, weight);
            out.node_mut(s).init_weight = W::zero();
        }

        left_finals = boundary(&out, fsm, &map, |n| n.final_weight);
    }

    tracing::debug!(
        inputs = fsms.len(),
        states = out.num_states(),
        arcs = out.num_arcs(),
        "concat"
    );
    out
}

/// Copied indices of `src`'s states whose selected weight is non-zero.
fn boundary<W: Semiring>(
    out: &Fsm<W>,
    src: &Fsm<W>,
    map: &[u32],
    weight: impl Fn(&Node<W>) -> W,
) -> Vec<(u32, W)> {
    src.live_indices()
        .map(|s| map[s as usize])
        .filter_map(|copy| {
            let w = weight(out.node(copy));
            (!w.is_zero()).then_some((copy, w))
        })
        .collect()
}
