// Reachability pruning.

use std::collections::VecDeque;

use wfsm_semiring::Semiring;

use crate::fsm::{Fsm, StateId};

/// States reachable from an initial state along outgoing arcs.
pub fn accessible<W: Semiring>(fsm: &Fsm<W>) -> Vec<StateId> {
    collect(fsm, &forward_reach(fsm))
}

/// States from which a final state is reachable.
pub fn coaccessible<W: Semiring>(fsm: &Fsm<W>) -> Vec<StateId> {
    collect(fsm, &backward_reach(fsm))
}

/// Remove every state that is not both accessible and coaccessible.
///
/// In place; handles to surviving states remain valid. Returns the number of
/// states removed. Determinization must only see trimmed input: a dead
/// branch would otherwise contribute to class weights without ever reaching
/// acceptance.
pub fn connect<W: Semiring>(fsm: &mut Fsm<W>) -> usize {
    let fwd = forward_reach(fsm);
    let bwd = backward_reach(fsm);
    let doomed: Vec<u32> = fsm
        .live_indices()
        .filter(|&s| !(fwd[s as usize] && bwd[s as usize]))
        .collect();
    for &s in &doomed {
        fsm.remove_index(s);
    }
    tracing::debug!(removed = doomed.len(), remaining = fsm.num_states(), "connect");
    doomed.len()
}

pub(crate) fn forward_reach<W: Semiring>(fsm: &Fsm<W>) -> Vec<bool> {
    let seeds = fsm
        .live_indices()
        .filter(|&s| !fsm.node(s).init_weight.is_zero());
    bfs(fsm, seeds, |fsm, s| {
        fsm.node(s).arcs.iter().map(|&(d, _)| d).collect()
    })
}

pub(crate) fn backward_reach<W: Semiring>(fsm: &Fsm<W>) -> Vec<bool> {
    let seeds = fsm
        .live_indices()
        .filter(|&s| !fsm.node(s).final_weight.is_zero());
    bfs(fsm, seeds, |fsm, s| fsm.node(s).preds.clone())
}

fn bfs<W: Semiring>(
    fsm: &Fsm<W>,
    seeds: impl Iterator<Item = u32>,
    next: impl Fn(&Fsm<W>, u32) -> Vec<u32>,
) -> Vec<bool> {
    let mut seen = vec![false; fsm.capacity()];
    let mut queue = VecDeque::new();
    for s in seeds {
        if !seen[s as usize] {
            seen[s as usize] = true;
            queue.push_back(s);
        }
    }
    while let Some(s) = queue.pop_front() {
        for d in next(fsm, s) {
            if !seen[d as usize] {
                seen[d as usize] = true;
                queue.push_back(d);
            }
        }
    }
    seen
}

fn collect<W: Semiring>(fsm: &Fsm<W>, mask: &[bool]) -> Vec<StateId> {
    fsm.live_indices()
        .filter(|&s| mask[s as usize])
        .map(|s| fsm.id(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::StateSpec;
    use wfsm_semiring::LogWeight;

    #[test]
    fn removes_inaccessible_and_dead_states() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::new().label("a").initial(LogWeight::one()));
        let b = fsm.add_state(StateSpec::new().label("b").accepting(LogWeight::one()));
        let dead = fsm.add_state(StateSpec::new().label("dead"));
        let orphan = fsm.add_state(StateSpec::new().label("orphan"));
        fsm.add_arc(a, b, LogWeight::one()).unwrap();
        fsm.add_arc(a, dead, LogWeight::one()).unwrap();
        fsm.add_arc(orphan, b, LogWeight::one()).unwrap();

        assert_eq!(accessible(&fsm), vec![a, b, dead]);
        assert_eq!(coaccessible(&fsm), vec![a, b, orphan]);

        assert_eq!(connect(&mut fsm), 2);
        assert_eq!(fsm.state_ids(), vec![a, b]);
        assert_eq!(fsm.num_arcs(), 1);
    }

    #[test]
    fn trimmed_fsm_is_unchanged() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(
            StateSpec::new()
                .initial(LogWeight::one())
                .accepting(LogWeight::one()),
        );
        fsm.add_arc(a, a, LogWeight::new(-1.0)).unwrap();
        assert_eq!(connect(&mut fsm), 0);
        assert_eq!(fsm.num_arcs(), 1);
    }

    #[test]
    fn no_initial_states_removes_everything() {
        let mut fsm = Fsm::<LogWeight>::new();
        fsm.add_state(StateSpec::new().accepting(LogWeight::one()));
        assert_eq!(connect(&mut fsm), 1);
        assert!(fsm.is_empty());
    }
}
