// Hierarchical substitution of labeled states by sub-automata.

use hashbrown::HashMap;
use wfsm_semiring::Semiring;

use crate::fsm::Fsm;
use crate::{FsmError, Result};

/// Splice a fresh copy of `subs[label]` in place of every state whose label
/// is a key of `subs`. One level only: states brought in by a copy are not
/// expanded again. Returns the number of states replaced.
///
/// For a replaced state `s` and its copy `C`:
///
/// - an incoming arc `p -> s (w)` becomes `p -> i (w ⊗ init(i))` for every
///   initial state `i` of `C`
/// - an outgoing arc `s -> c (w)` becomes `f -> c (final(f) ⊗ w)` for every
///   final state `f` of `C`
/// - a self-loop `s -> s (w)` becomes `f -> i (final(f) ⊗ w ⊗ init(i))`
/// - `s`'s own initial and final weights are ⊗-combined onto the initial and
///   final weights of `C`; otherwise `C`'s boundary weights are cleared
///
/// `s` is then removed. Handles to other states stay valid.
pub fn replace<W: Semiring>(fsm: &mut Fsm<W>, subs: &HashMap<String, Fsm<W>>) -> Result<usize> {
    let targets: Vec<(u32, &Fsm<W>)> = fsm
        .live_indices()
        .filter_map(|s| {
            let label = fsm.node(s).label.as_ref()?;
            subs.get(label).map(|sub| (s, sub))
        })
        .collect();

    for &(s, sub) in &targets {
        splice(fsm, s, sub);
    }
    tracing::debug!(replaced = targets.len(), states = fsm.num_states(), "replace");
    Ok(targets.len())
}

/// Expand `subs` recursively until no state carries a key of `subs`, on a
/// compacted copy of `fsm`.
///
/// Fails with [`FsmError::RecursiveSubstitution`] when a sub-automaton
/// contains, directly or through other substitutions, a state carrying its
/// own key. The check runs before any expansion.
pub fn compose<W: Semiring>(fsm: &Fsm<W>, subs: &HashMap<String, Fsm<W>>) -> Result<Fsm<W>> {
    check_substitutions(subs)?;

    let mut out = fsm.clone();
    let mut rounds = 0;
    while replace(&mut out, subs)? > 0 {
        rounds += 1;
    }
    out.compact();
    tracing::debug!(rounds, states = out.num_states(), arcs = out.num_arcs(), "compose");
    Ok(out)
}

fn splice<W: Semiring>(fsm: &mut Fsm<W>, s: u32, sub: &Fsm<W>) {
    let map = fsm.absorb(sub);
    let copies: Vec<u32> = sub.live_indices().map(|q| map[q as usize]).collect();

    let (own_init, own_final) = {
        let node = fsm.node(s);
        (node.init_weight, node.final_weight)
    };
    let mut inits = Vec::new();
    let mut finals = Vec::new();
    for &q in &copies {
        let node = fsm.node_mut(q);
        if !node.init_weight.is_zero() {
            inits.push((q, node.init_weight));
        }
        if !node.final_weight.is_zero() {
            finals.push((q, node.final_weight));
        }
        node.init_weight = node.init_weight.times(&own_init);
        node.final_weight = node.final_weight.times(&own_final);
    }

    let incoming = fsm.incoming(s);
    let outgoing = fsm.node(s).arcs.clone();
    let mut rewired = Vec::new();
    for &(p, w) in incoming.iter().filter(|&&(p, _)| p != s) {
        for &(i, wi) in &inits {
            rewired.push((p, i, w.times(&wi)));
        }
    }
    for &(c, w) in &outgoing {
        for &(f, wf) in &finals {
            if c != s {
                rewired.push((f, c, wf.times(&w)));
                continue;
            }
            for &(i, wi) in &inits {
                rewired.push((f, i, wf.times(&w).times(&wi)));
            }
        }
    }
    for (src, dst, w) in rewired {
        if !w.is_zero() {
            fsm.push_arc(src, dst, w);
        }
    }
    fsm.remove_index(s);
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Active,
    Done,
}

fn check_substitutions<W: Semiring>(subs: &HashMap<String, Fsm<W>>) -> Result<()> {
    let mut keys: Vec<&str> = subs.keys().map(String::as_str).collect();
    keys.sort_unstable();
    let mut marks = HashMap::new();
    for key in keys {
        visit(key, subs, &mut marks)?;
    }
    Ok(())
}

fn visit<'a, W: Semiring>(
    label: &'a str,
    subs: &'a HashMap<String, Fsm<W>>,
    marks: &mut HashMap<&'a str, Mark>,
) -> Result<()> {
    match marks.get(label) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Active) => {
            return Err(FsmError::RecursiveSubstitution {
                label: label.to_string(),
            });
        }
        None => {}
    }
    let Some(sub) = subs.get(label) else {
        return Ok(());
    };

    marks.insert(label, Mark::Active);
    for q in sub.live_indices() {
        if let Some(inner) = sub.node(q).label.as_deref() {
            if subs.contains_key(inner) {
                visit(inner, subs, marks)?;
            }
        }
    }
    marks.insert(label, Mark::Done);
    Ok(())
}
