// Nil-state (epsilon) elimination.

use wfsm_semiring::Semiring;

use crate::fsm::Fsm;

/// Remove every eligible nil state in place, bridging around it.
///
/// A nil state is non-emitting, unlabeled, and neither initial nor final.
/// For each one, every incoming arc `p -> s (wp)` and outgoing arc
/// `s -> c (wc)` is replaced by `p -> c (wp ⊗ wc)`, folded into an existing
/// `p -> c` arc when there is one, and `s` is deleted. A nil state with a
/// self-loop is kept: its loop cannot be bridged without a closure weight.
///
/// Bridging can put a loop on a neighbouring nil state, so eligibility is
/// re-checked on every worklist pop and the scan repeats until a pass removes
/// nothing. Returns the number of states removed.
pub fn eliminate_nil_states<W: Semiring>(fsm: &mut Fsm<W>) -> usize {
    let before = fsm.num_states();
    let mut removed = 0;

    loop {
        let worklist: Vec<u32> = fsm.live_indices().filter(|&s| eligible(fsm, s)).collect();
        if worklist.is_empty() {
            break;
        }

        let mut progressed = false;
        for s in worklist {
            if !fsm.is_live(s) || !eligible(fsm, s) {
                continue;
            }
            bridge(fsm, s);
            removed += 1;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    tracing::debug!(before, after = fsm.num_states(), removed, "eliminate_nil_states");
    removed
}

fn eligible<W: Semiring>(fsm: &Fsm<W>, s: u32) -> bool {
    let node = fsm.node(s);
    node.is_nil() && node.arcs.iter().all(|&(d, _)| d != s)
}

fn bridge<W: Semiring>(fsm: &mut Fsm<W>, s: u32) {
    let incoming = fsm.incoming(s);
    let outgoing = fsm.node(s).arcs.clone();
    for &(p, wp) in &incoming {
        for &(c, wc) in &outgoing {
            let w = wp.times(&wc);
            if !w.is_zero() {
                fsm.merge_arc(p, c, w);
            }
        }
    }
    fsm.remove_index(s);
}
