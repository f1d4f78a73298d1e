// Weight pushing toward the initial states.

use wfsm_semiring::DivisibleSemiring;

use crate::connect::forward_reach;
use crate::fsm::Fsm;
use crate::paths::kahn;
use crate::{FsmError, Result};

/// Push weight toward the initial states, in place.
///
/// The states reachable from the initial frontier are visited once each in
/// topological order. With `β(s)` the ⊕-sum of the path weights from `s` to
/// acceptance, every reachable state is rewritten as
///
/// - `w(s -> c)  := w ⊗ β(c) / β(s)`
/// - `final(s)   := final(s) / β(s)`
/// - `init(s)    := init(s) ⊗ β(s)`
///
/// Every accepting path keeps its weight, and afterwards the exits of each
/// live-ended state (outgoing arcs plus final weight) ⊕-sum to `one`, so a
/// path prefix can be scored without looking further ahead. States whose
/// `β` is `zero` get `zero` exits.
///
/// The reachable part must be acyclic; otherwise [`FsmError::Cyclic`] is
/// returned and the FSM is left untouched.
pub fn push_weights<W: DivisibleSemiring>(fsm: &mut Fsm<W>) -> Result<()> {
    let reach = forward_reach(fsm);
    let order = kahn(fsm, Some(&reach)).map_err(|s| FsmError::Cyclic { state: fsm.id(s) })?;

    let mut beta = vec![W::zero(); fsm.capacity()];
    for &s in order.iter().rev() {
        let node = fsm.node(s);
        let total = node
            .arcs
            .iter()
            .fold(node.final_weight, |acc, &(d, w)| {
                acc.plus(&w.times(&beta[d as usize]))
            });
        beta[s as usize] = total;
    }

    for &s in &order {
        let b = beta[s as usize];
        let node = fsm.node_mut(s);
        for (d, w) in node.arcs.iter_mut() {
            *w = w.times(&beta[*d as usize]).divide(&b);
        }
        node.final_weight = node.final_weight.divide(&b);
        node.init_weight = node.init_weight.times(&b);
    }

    tracing::debug!(states = order.len(), "push_weights");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::StateSpec;
    use crate::paths::sequence_weights;
    use wfsm_semiring::{LogWeight, ProbabilityWeight, Semiring};

    fn p(x: f64) -> LogWeight {
        LogWeight::from_probability(x)
    }

    fn sample() -> Fsm<LogWeight> {
        // a -> b -> d, a -> c -> d, with c also final
        let mut fsm = Fsm::new();
        let a = fsm.add_state(StateSpec::emitting("a", 0).initial(p(0.5)));
        let b = fsm.add_state(StateSpec::emitting("b", 1));
        let c = fsm.add_state(StateSpec::emitting("c", 2).accepting(p(0.2)));
        let d = fsm.add_state(StateSpec::emitting("d", 3).accepting(p(0.9)));
        fsm.add_arc(a, b, p(0.3)).unwrap();
        fsm.add_arc(a, c, p(0.6)).unwrap();
        fsm.add_arc(b, d, p(0.7)).unwrap();
        fsm.add_arc(c, d, p(0.4)).unwrap();
        fsm
    }

    #[test]
    fn preserves_path_weights() {
        let mut fsm = sample();
        let before = sequence_weights(&fsm).unwrap();
        push_weights(&mut fsm).unwrap();
        let after = sequence_weights(&fsm).unwrap();
        assert_eq!(before.len(), after.len());
        for (seq, w) in &before {
            assert!(after[seq].approx_eq(w, 1e-9), "{seq:?}");
        }
    }

    #[test]
    fn exits_become_stochastic() {
        let mut fsm = sample();
        push_weights(&mut fsm).unwrap();
        for state in fsm.states() {
            let total = fsm
                .arcs(state.id())
                .unwrap()
                .fold(state.final_weight(), |acc, arc| acc.plus(&arc.weight));
            assert!(total.approx_eq(&LogWeight::one(), 1e-9));
        }
    }

    #[test]
    fn cyclic_input_is_rejected_untouched() {
        let mut fsm = sample();
        let ids = fsm.state_ids();
        fsm.add_arc(ids[3], ids[0], p(0.1)).unwrap();
        let first = fsm.arcs(ids[0]).unwrap().next().unwrap().weight;

        assert!(matches!(push_weights(&mut fsm), Err(FsmError::Cyclic { .. })));
        assert_eq!(fsm.arcs(ids[0]).unwrap().next().unwrap().weight, first);
    }

    #[test]
    fn dead_end_gets_zero_exits() {
        let mut fsm = Fsm::new();
        let a = fsm.add_state(StateSpec::emitting("a", 0).initial(LogWeight::one()));
        let dead = fsm.add_state(StateSpec::emitting("x", 1));
        fsm.add_arc(a, dead, p(0.5)).unwrap();
        push_weights(&mut fsm).unwrap();
        assert!(fsm.arcs(a).unwrap().next().unwrap().weight.is_zero());
        assert!(fsm.state(a).unwrap().init_weight().is_zero());
    }
}
