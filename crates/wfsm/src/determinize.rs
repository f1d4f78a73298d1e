// Weighted subset construction, forward or backward.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashMap;
use wfsm_semiring::{DivisibleSemiring, Semiring};

use crate::config::DeterminizeConfig;
use crate::fsm::{Fsm, Node};
use crate::{FsmError, Result};

/// Which side of the automaton a subset construction starts from.
///
/// `Forward` seeds classes from initial weights, follows outgoing arcs and
/// accepts through final weights. `Backward` seeds from final weights,
/// follows incoming arcs, accepts through initial weights, and writes its
/// arcs reversed, so the result has the input's orientation but no two
/// predecessors of a state share a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn seed<W: Semiring>(self, node: &Node<W>) -> W {
        match self {
            Direction::Forward => node.init_weight,
            Direction::Backward => node.final_weight,
        }
    }

    fn accept<W: Semiring>(self, node: &Node<W>) -> W {
        match self {
            Direction::Forward => node.final_weight,
            Direction::Backward => node.init_weight,
        }
    }

    fn exits<W: Semiring>(self, fsm: &Fsm<W>, s: u32) -> Vec<(u32, W)> {
        match self {
            Direction::Forward => fsm.node(s).arcs.clone(),
            Direction::Backward => fsm.incoming(s),
        }
    }

    fn add_seed<W: Semiring>(self, node: &mut Node<W>, w: &W) {
        match self {
            Direction::Forward => node.init_weight = node.init_weight.plus(w),
            Direction::Backward => node.final_weight = node.final_weight.plus(w),
        }
    }

    fn set_accept<W: Semiring>(self, node: &mut Node<W>, w: W) {
        match self {
            Direction::Forward => node.final_weight = w,
            Direction::Backward => node.init_weight = w,
        }
    }

    fn emit<W: Semiring>(self, out: &mut Fsm<W>, from: u32, to: u32, w: W) {
        match self {
            Direction::Forward => out.merge_arc(from, to, w),
            Direction::Backward => out.merge_arc(to, from, w),
        }
    }
}

/// Members of a class: `(input state, residual weight)`, sorted by state.
type Class<W> = Vec<(u32, W)>;

/// Hashable identity of a class: member states with quantized residuals.
type ClassKey = Vec<(u32, i64)>;

/// Build a new FSM in which no two seeds and no two exits of any state
/// share a label (per `direction`).
///
/// Each output state stands for a class of input states carrying the same
/// label together with their residual weight shares. Two classes are the
/// same output state only when they hold the same input states with the
/// same residuals up to `config.delta`, which keeps the weight of every
/// label sequence intact (the ⊕ over all input paths emitting it).
///
/// The output label is the class label; the pdf index is the one shared by
/// every member, or `None` when members disagree.
///
/// Fails with [`FsmError::StateLimitExceeded`] once the output would exceed
/// `config.max_states`, and with [`FsmError::InvalidDelta`] when
/// `config.delta` is not a finite positive step. Dead branches participate in class weights, so run
/// [`connect`](crate::connect()) first when the input is not trim.
pub fn determinize<W: DivisibleSemiring>(
    fsm: &Fsm<W>,
    direction: Direction,
    config: &DeterminizeConfig,
) -> Result<Fsm<W>> {
    config.validate()?;
    let mut subsets = Subsets {
        input: fsm,
        config,
        out: Fsm::new(),
        visited: HashMap::new(),
        queue: VecDeque::new(),
    };

    let seeds = group_by_label(
        fsm,
        fsm.live_indices()
            .map(|s| (s, direction.seed(fsm.node(s))))
            .collect(),
    );
    for (label, members) in seeds {
        let (total, class) = residuals(members);
        let c = subsets.intern(label, class)?;
        direction.add_seed(subsets.out.node_mut(c), &total);
    }

    while let Some((c, class)) = subsets.queue.pop_front() {
        let accept = class.iter().fold(W::zero(), |acc, &(q, r)| {
            acc.plus(&r.times(&direction.accept(fsm.node(q))))
        });
        direction.set_accept(subsets.out.node_mut(c), accept);

        let mut reached = Vec::new();
        for &(q, r) in &class {
            for (d, w) in direction.exits(fsm, q) {
                reached.push((d, r.times(&w)));
            }
        }
        for (label, members) in group_by_label(fsm, reached) {
            let (total, next) = residuals(members);
            let n = subsets.intern(label, next)?;
            direction.emit(&mut subsets.out, c, n, total);
        }
        tracing::trace!(class = c, members = class.len(), "expanded class");
    }

    tracing::debug!(
        ?direction,
        states_in = fsm.num_states(),
        states_out = subsets.out.num_states(),
        arcs_out = subsets.out.num_arcs(),
        "determinize"
    );
    Ok(subsets.out)
}

/// Whether no two seeds and no two exits of any state lead to distinct
/// states sharing a label, per `direction`.
pub fn is_deterministic<W: Semiring>(fsm: &Fsm<W>, direction: Direction) -> bool {
    let seeds = fsm
        .live_indices()
        .filter(|&s| !direction.seed(fsm.node(s)).is_zero());
    if !labels_unique(fsm, seeds) {
        return false;
    }
    fsm.live_indices().all(|s| {
        labels_unique(fsm, direction.exits(fsm, s).into_iter().map(|(d, _)| d))
    })
}

fn labels_unique<W: Semiring>(fsm: &Fsm<W>, targets: impl Iterator<Item = u32>) -> bool {
    let mut seen: HashMap<Option<&str>, u32> = HashMap::new();
    for d in targets {
        let label = fsm.node(d).label.as_deref();
        if *seen.entry(label).or_insert(d) != d {
            return false;
        }
    }
    true
}

struct Subsets<'a, W> {
    input: &'a Fsm<W>,
    config: &'a DeterminizeConfig,
    out: Fsm<W>,
    visited: HashMap<ClassKey, u32>,
    queue: VecDeque<(u32, Class<W>)>,
}

impl<W: DivisibleSemiring> Subsets<'_, W> {
    /// Output index of `class`, creating and enqueueing it on first sight.
    fn intern(&mut self, label: Option<String>, class: Class<W>) -> Result<u32> {
        let key: ClassKey = class
            .iter()
            .map(|(q, r)| (*q, r.quantize(self.config.delta)))
            .collect();
        if let Some(&c) = self.visited.get(&key) {
            return Ok(c);
        }
        if let Some(limit) = self.config.max_states {
            if self.out.num_states() >= limit {
                return Err(FsmError::StateLimitExceeded { limit });
            }
        }

        let first = self.input.node(class[0].0).pdf_index;
        let shared = class
            .iter()
            .all(|&(q, _)| self.input.node(q).pdf_index == first);
        let node = Node {
            label,
            pdf_index: if shared { first } else { None },
            init_weight: W::zero(),
            final_weight: W::zero(),
            arcs: Vec::new(),
            preds: Vec::new(),
        };
        let c = self.out.push_node(node);
        self.visited.insert(key, c);
        self.queue.push_back((c, class));
        Ok(c)
    }
}

/// Group `(state, weight)` contributions by the state's label, ⊕-merging
/// contributions to the same state. Zero contributions are dropped.
fn group_by_label<W: Semiring>(
    fsm: &Fsm<W>,
    contributions: Vec<(u32, W)>,
) -> BTreeMap<Option<String>, BTreeMap<u32, W>> {
    let mut groups: BTreeMap<Option<String>, BTreeMap<u32, W>> = BTreeMap::new();
    for (s, w) in contributions {
        if w.is_zero() {
            continue;
        }
        groups
            .entry(fsm.node(s).label.clone())
            .or_default()
            .entry(s)
            .and_modify(|acc| *acc = acc.plus(&w))
            .or_insert(w);
    }
    groups
}

/// Split a group into its total weight and per-member residual shares.
fn residuals<W: DivisibleSemiring>(members: BTreeMap<u32, W>) -> (W, Class<W>) {
    let total = W::sum(members.values());
    let class = members
        .into_iter()
        .map(|(s, w)| (s, w.divide(&total)))
        .collect();
    (total, class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::StateSpec;
    use crate::paths::sequence_weights;
    use wfsm_semiring::{LogWeight, ProbabilityWeight};

    fn p(x: f64) -> LogWeight {
        LogWeight::from_probability(x)
    }

    fn assert_same_sequences(a: &Fsm<LogWeight>, b: &Fsm<LogWeight>) {
        let left = sequence_weights(a).unwrap();
        let right = sequence_weights(b).unwrap();
        assert_eq!(left.len(), right.len());
        for (seq, w) in &left {
            assert!(right[seq].approx_eq(w, 1e-9), "{seq:?}: {w} vs {}", right[seq]);
        }
    }

    /// Two initial `a` states, each followed by its own `b`.
    fn twin_paths() -> Fsm<LogWeight> {
        let mut fsm = Fsm::new();
        let a1 = fsm.add_state(StateSpec::emitting("a", 0).initial(p(0.25)));
        let a2 = fsm.add_state(StateSpec::emitting("a", 0).initial(p(0.75)));
        let b1 = fsm.add_state(StateSpec::emitting("b", 1).accepting(LogWeight::one()));
        let b2 = fsm.add_state(StateSpec::emitting("b", 2).accepting(LogWeight::one()));
        fsm.add_arc(a1, b1, LogWeight::one()).unwrap();
        fsm.add_arc(a2, b2, LogWeight::one()).unwrap();
        fsm
    }

    #[test]
    fn merges_same_label_seeds_and_successors() {
        let fsm = twin_paths();
        assert!(!is_deterministic(&fsm, Direction::Forward));

        let det = determinize(&fsm, Direction::Forward, &DeterminizeConfig::default()).unwrap();
        assert_eq!(det.num_states(), 2);
        assert_eq!(det.num_arcs(), 1);
        assert!(is_deterministic(&det, Direction::Forward));
        assert_same_sequences(&fsm, &det);

        let labels: Vec<_> = det.states().map(|s| (s.label(), s.pdf_index())).collect();
        assert_eq!(labels, vec![(Some("a"), Some(0)), (Some("b"), None)]);
    }

    #[test]
    fn distinct_subsets_with_same_label_stay_apart() {
        // a -> x1 -> p ; a -> y -> x2 -> q
        let mut fsm = Fsm::new();
        let a = fsm.add_state(StateSpec::new().label("a").initial(LogWeight::one()));
        let x1 = fsm.add_state(StateSpec::new().label("x"));
        let y = fsm.add_state(StateSpec::new().label("y"));
        let x2 = fsm.add_state(StateSpec::new().label("x"));
        let end_p = fsm.add_state(StateSpec::new().label("p").accepting(LogWeight::one()));
        let end_q = fsm.add_state(StateSpec::new().label("q").accepting(LogWeight::one()));
        fsm.add_arc(a, x1, p(0.4)).unwrap();
        fsm.add_arc(a, y, p(0.6)).unwrap();
        fsm.add_arc(y, x2, LogWeight::one()).unwrap();
        fsm.add_arc(x1, end_p, LogWeight::one()).unwrap();
        fsm.add_arc(x2, end_q, LogWeight::one()).unwrap();

        let det = determinize(&fsm, Direction::Forward, &DeterminizeConfig::default()).unwrap();
        assert_eq!(det.states().filter(|s| s.label() == Some("x")).count(), 2);
        assert_same_sequences(&fsm, &det);
    }

    #[test]
    fn residual_shares_distinguish_classes() {
        // Both branches reach {c1, c2} under label c, but with different
        // shares; merging them would misweight the d/e continuations.
        let mut fsm = Fsm::new();
        let s = fsm.add_state(StateSpec::new().label("s").initial(LogWeight::one()));
        let u = fsm.add_state(StateSpec::new().label("u"));
        let v = fsm.add_state(StateSpec::new().label("v"));
        let c1 = fsm.add_state(StateSpec::new().label("c"));
        let c2 = fsm.add_state(StateSpec::new().label("c"));
        let d = fsm.add_state(StateSpec::new().label("d").accepting(LogWeight::one()));
        let e = fsm.add_state(StateSpec::new().label("e").accepting(LogWeight::one()));
        fsm.add_arc(s, u, p(0.5)).unwrap();
        fsm.add_arc(s, v, p(0.5)).unwrap();
        fsm.add_arc(u, c1, p(0.9)).unwrap();
        fsm.add_arc(u, c2, p(0.1)).unwrap();
        fsm.add_arc(v, c1, p(0.1)).unwrap();
        fsm.add_arc(v, c2, p(0.9)).unwrap();
        fsm.add_arc(c1, d, LogWeight::one()).unwrap();
        fsm.add_arc(c2, e, LogWeight::one()).unwrap();

        let det = determinize(&fsm, Direction::Forward, &DeterminizeConfig::default()).unwrap();
        assert_eq!(det.states().filter(|s| s.label() == Some("c")).count(), 2);
        assert_same_sequences(&fsm, &det);
    }

    #[test]
    fn redeterminizing_is_isomorphic() {
        let cfg = DeterminizeConfig::default();
        let once = determinize(&twin_paths(), Direction::Forward, &cfg).unwrap();
        let twice = determinize(&once, Direction::Forward, &cfg).unwrap();
        assert_eq!(once.num_states(), twice.num_states());
        assert_eq!(once.num_arcs(), twice.num_arcs());
        assert_same_sequences(&once, &twice);

        // Singleton classes map each state onto one with the same attributes
        // and boundary weights, in the same discovery order.
        let attrs = |fsm: &Fsm<LogWeight>| -> Vec<_> {
            fsm.states()
                .map(|s| {
                    let label = s.label().map(str::to_string);
                    (label, s.pdf_index(), s.init_weight(), s.final_weight())
                })
                .collect()
        };
        assert_eq!(attrs(&once), attrs(&twice));
        let arcs = |fsm: &Fsm<LogWeight>| -> Vec<_> {
            fsm.all_arcs()
                .map(|a| (a.src.index(), a.dst.index(), a.weight))
                .collect()
        };
        assert_eq!(arcs(&once), arcs(&twice));
    }

    #[test]
    fn backward_merges_shared_suffixes() {
        let mut fsm = Fsm::new();
        let a = fsm.add_state(StateSpec::new().label("a").initial(p(0.5)));
        let b = fsm.add_state(StateSpec::new().label("b").initial(p(0.5)));
        let c1 = fsm.add_state(StateSpec::new().label("c").accepting(LogWeight::one()));
        let c2 = fsm.add_state(StateSpec::new().label("c").accepting(LogWeight::one()));
        fsm.add_arc(a, c1, LogWeight::one()).unwrap();
        fsm.add_arc(b, c2, LogWeight::one()).unwrap();

        assert!(is_deterministic(&fsm, Direction::Forward));
        assert!(!is_deterministic(&fsm, Direction::Backward));

        let det = determinize(&fsm, Direction::Backward, &DeterminizeConfig::default()).unwrap();
        assert_eq!(det.num_states(), 3);
        assert_eq!(det.num_arcs(), 2);
        assert!(is_deterministic(&det, Direction::Backward));
        assert_eq!(det.final_states().len(), 1);
        assert_eq!(det.initial_states().len(), 2);
        assert_same_sequences(&fsm, &det);
    }

    #[test]
    fn cyclic_input_terminates() {
        let mut fsm = Fsm::new();
        let a = fsm.add_state(StateSpec::new().label("a").initial(LogWeight::one()));
        let b = fsm.add_state(StateSpec::new().label("b").accepting(p(0.5)));
        fsm.add_arc(a, b, LogWeight::one()).unwrap();
        fsm.add_arc(b, a, p(0.5)).unwrap();

        let det = determinize(&fsm, Direction::Forward, &DeterminizeConfig::default()).unwrap();
        assert_eq!(det.num_states(), 2);
        assert_eq!(det.num_arcs(), 2);
    }

    #[test]
    fn degenerate_delta_is_rejected() {
        for delta in [0.0, -1.0, f64::NAN] {
            let cfg = DeterminizeConfig::default().with_delta(delta);
            for direction in [Direction::Forward, Direction::Backward] {
                let err = determinize(&twin_paths(), direction, &cfg).unwrap_err();
                assert!(
                    matches!(err, FsmError::InvalidDelta(d) if d.to_bits() == delta.to_bits()),
                    "{delta}"
                );
            }
        }
    }

    #[test]
    fn state_limit_is_enforced() {
        let cfg = DeterminizeConfig::default().with_max_states(1);
        assert!(matches!(
            determinize(&twin_paths(), Direction::Forward, &cfg),
            Err(FsmError::StateLimitExceeded { limit: 1 })
        ));
    }
}
