// Arc reversal.

use wfsm_semiring::Semiring;

use crate::fsm::Fsm;

/// A new FSM with every arc reversed and each state's initial and final
/// weights swapped. Labels and pdf indices are copied; state order is kept.
pub fn transpose<W: Semiring>(fsm: &Fsm<W>) -> Fsm<W> {
    let mut out = Fsm::new();
    let mut map = vec![u32::MAX; fsm.capacity()];
    for s in fsm.live_indices() {
        let mut node = fsm.node(s).detached();
        std::mem::swap(&mut node.init_weight, &mut node.final_weight);
        map[s as usize] = out.push_node(node);
    }
    for s in fsm.live_indices() {
        for &(d, w) in &fsm.node(s).arcs {
            out.push_arc(map[d as usize], map[s as usize], w);
        }
    }
    out
}
