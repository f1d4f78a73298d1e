// Weighted FSM data model: state arena, per-state adjacency, builders.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use wfsm_semiring::Semiring;

use crate::{FsmError, Result};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

fn fresh_tag() -> u64 {
    NEXT_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a state of one particular [`Fsm`] instance.
///
/// A handle records which instance issued it, so using it on another FSM
/// (or after [`Fsm::compact`]) fails with [`FsmError::ForeignState`] instead
/// of silently addressing an unrelated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId {
    tag: u64,
    index: u32,
}

impl StateId {
    /// Position of the state in its FSM's arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.index)
    }
}

/// A weighted transition `src -> dst`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<W> {
    pub src: StateId,
    pub dst: StateId,
    pub weight: W,
}

/// Attributes for a new state.
///
/// Defaults: unlabeled, non-emitting, initial and final weight `zero`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpec<W> {
    pub label: Option<String>,
    pub pdf_index: Option<u32>,
    pub init_weight: W,
    pub final_weight: W,
}

impl<W: Semiring> Default for StateSpec<W> {
    fn default() -> Self {
        Self {
            label: None,
            pdf_index: None,
            init_weight: W::zero(),
            final_weight: W::zero(),
        }
    }
}

impl<W: Semiring> StateSpec<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// An emitting state tagged with `label` and output distribution `pdf_index`.
    pub fn emitting(label: impl Into<String>, pdf_index: u32) -> Self {
        Self::new().label(label).pdf_index(pdf_index)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn pdf_index(mut self, pdf_index: u32) -> Self {
        self.pdf_index = Some(pdf_index);
        self
    }

    pub fn initial(mut self, weight: W) -> Self {
        self.init_weight = weight;
        self
    }

    pub fn accepting(mut self, weight: W) -> Self {
        self.final_weight = weight;
        self
    }
}

/// Arena slot for one live state.
#[derive(Debug, Clone)]
pub(crate) struct Node<W> {
    pub(crate) label: Option<String>,
    pub(crate) pdf_index: Option<u32>,
    pub(crate) init_weight: W,
    pub(crate) final_weight: W,
    /// Outgoing arcs as `(dst index, weight)`.
    pub(crate) arcs: Vec<(u32, W)>,
    /// Source index of every incoming arc, one entry per arc.
    pub(crate) preds: Vec<u32>,
}

impl<W: Semiring> Node<W> {
    pub(crate) fn from_spec(spec: StateSpec<W>) -> Self {
        Self {
            label: spec.label,
            pdf_index: spec.pdf_index,
            init_weight: spec.init_weight,
            final_weight: spec.final_weight,
            arcs: Vec::new(),
            preds: Vec::new(),
        }
    }

    /// Copy of the attributes without any adjacency.
    pub(crate) fn detached(&self) -> Self {
        Self {
            label: self.label.clone(),
            pdf_index: self.pdf_index,
            init_weight: self.init_weight,
            final_weight: self.final_weight,
            arcs: Vec::new(),
            preds: Vec::new(),
        }
    }

    /// Non-emitting, unlabeled, neither initial nor final.
    pub(crate) fn is_nil(&self) -> bool {
        self.pdf_index.is_none()
            && self.label.is_none()
            && self.init_weight.is_zero()
            && self.final_weight.is_zero()
    }
}

/// Read-only view of one state.
#[derive(Debug, Clone, Copy)]
pub struct StateRef<'a, W> {
    id: StateId,
    node: &'a Node<W>,
}

impl<'a, W: Semiring> StateRef<'a, W> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn label(&self) -> Option<&'a str> {
        self.node.label.as_deref()
    }

    pub fn pdf_index(&self) -> Option<u32> {
        self.node.pdf_index
    }

    pub fn init_weight(&self) -> W {
        self.node.init_weight
    }

    pub fn final_weight(&self) -> W {
        self.node.final_weight
    }

    pub fn is_initial(&self) -> bool {
        !self.node.init_weight.is_zero()
    }

    pub fn is_final(&self) -> bool {
        !self.node.final_weight.is_zero()
    }

    pub fn is_emitting(&self) -> bool {
        self.node.pdf_index.is_some()
    }

    /// Candidate for nil-state elimination (ignoring self-loops).
    pub fn is_nil(&self) -> bool {
        self.node.is_nil()
    }

    pub fn num_arcs(&self) -> usize {
        self.node.arcs.len()
    }
}

/// Weighted finite-state machine with any number of weighted initial and
/// final states.
///
/// States live in an arena indexed by [`StateId`]. Removing a state leaves a
/// tombstone so the handles of surviving states stay valid; [`compact`]
/// renumbers densely and retires every outstanding handle.
///
/// [`compact`]: Fsm::compact
pub struct Fsm<W> {
    tag: u64,
    nodes: Vec<Option<Node<W>>>,
    live: usize,
    arc_count: usize,
}

impl<W: Semiring> Default for Fsm<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> Clone for Fsm<W> {
    /// The copy is a distinct instance: handles of `self` are foreign to it.
    fn clone(&self) -> Self {
        Self {
            tag: fresh_tag(),
            nodes: self.nodes.clone(),
            live: self.live,
            arc_count: self.arc_count,
        }
    }
}

impl<W: Semiring> fmt::Debug for Fsm<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("tag", &self.tag)
            .field("state_count", &self.live)
            .field("arc_count", &self.arc_count)
            .field("tombstones", &(self.nodes.len() - self.live))
            .finish()
    }
}

impl<W: Semiring> Fsm<W> {
    pub fn new() -> Self {
        Self {
            tag: fresh_tag(),
            nodes: Vec::new(),
            live: 0,
            arc_count: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// Add a state with the given attributes.
    pub fn add_state(&mut self, spec: StateSpec<W>) -> StateId {
        let index = self.nodes.len() as u32;
        self.nodes.push(Some(Node::from_spec(spec)));
        self.live += 1;
        self.id(index)
    }

    /// Append `src -> dst` with `weight` to `src`'s adjacency.
    ///
    /// Both handles must belong to this FSM and refer to live states.
    pub fn add_arc(&mut self, src: StateId, dst: StateId, weight: W) -> Result<()> {
        let s = self.check(src)?;
        let d = self.check(dst)?;
        self.push_arc(s, d, weight);
        Ok(())
    }

    /// Delete `state` together with every arc entering or leaving it.
    pub fn remove_state(&mut self, state: StateId) -> Result<()> {
        let i = self.check(state)?;
        self.remove_index(i);
        Ok(())
    }

    pub fn set_init_weight(&mut self, state: StateId, weight: W) -> Result<()> {
        let i = self.check(state)?;
        self.node_mut(i).init_weight = weight;
        Ok(())
    }

    pub fn set_final_weight(&mut self, state: StateId, weight: W) -> Result<()> {
        let i = self.check(state)?;
        self.node_mut(i).final_weight = weight;
        Ok(())
    }

    pub fn set_label(&mut self, state: StateId, label: Option<String>) -> Result<()> {
        let i = self.check(state)?;
        self.node_mut(i).label = label;
        Ok(())
    }

    pub fn set_pdf_index(&mut self, state: StateId, pdf_index: Option<u32>) -> Result<()> {
        let i = self.check(state)?;
        self.node_mut(i).pdf_index = pdf_index;
        Ok(())
    }

    /// Renumber live states densely, dropping tombstones.
    ///
    /// The FSM receives a fresh instance tag, so every handle issued before
    /// the call is rejected afterwards. Returns the new handles in the old
    /// arena order.
    pub fn compact(&mut self) -> Vec<StateId> {
        let mut remap = vec![u32::MAX; self.nodes.len()];
        let mut next = 0u32;
        for (old, slot) in self.nodes.iter().enumerate() {
            if slot.is_some() {
                remap[old] = next;
                next += 1;
            }
        }
        let nodes: Vec<Option<Node<W>>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .flatten()
            .map(|mut node| {
                for (dst, _) in &mut node.arcs {
                    *dst = remap[*dst as usize];
                }
                for p in &mut node.preds {
                    *p = remap[*p as usize];
                }
                Some(node)
            })
            .collect();
        self.nodes = nodes;
        self.tag = fresh_tag();
        (0..next).map(|i| self.id(i)).collect()
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub fn num_states(&self) -> usize {
        self.live
    }

    pub fn num_arcs(&self) -> usize {
        self.arc_count
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `state` is a live state of this instance.
    pub fn contains(&self, state: StateId) -> bool {
        self.check(state).is_ok()
    }

    pub fn state(&self, state: StateId) -> Result<StateRef<'_, W>> {
        let i = self.check(state)?;
        Ok(StateRef {
            id: state,
            node: self.node(i),
        })
    }

    /// All live states in arena order.
    pub fn states(&self) -> impl Iterator<Item = StateRef<'_, W>> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|node| StateRef {
                id: self.id(i as u32),
                node,
            })
        })
    }

    pub fn state_ids(&self) -> Vec<StateId> {
        self.states().map(|s| s.id()).collect()
    }

    /// Outgoing arcs of `state`, in insertion order.
    pub fn arcs(
        &self,
        state: StateId,
    ) -> Result<impl Iterator<Item = Transition<W>> + '_> {
        let i = self.check(state)?;
        Ok(self.node(i).arcs.iter().map(move |&(d, weight)| Transition {
            src: state,
            dst: self.id(d),
            weight,
        }))
    }

    /// Incoming arcs of `state`, grouped by source.
    pub fn arcs_into(&self, state: StateId) -> Result<Vec<Transition<W>>> {
        let i = self.check(state)?;
        Ok(self
            .incoming(i)
            .into_iter()
            .map(|(p, weight)| Transition {
                src: self.id(p),
                dst: state,
                weight,
            })
            .collect())
    }

    /// Every arc of the FSM, grouped by source state.
    pub fn all_arcs(&self) -> impl Iterator<Item = Transition<W>> + '_ {
        self.live_indices().flat_map(move |s| {
            self.node(s).arcs.iter().map(move |&(d, weight)| Transition {
                src: self.id(s),
                dst: self.id(d),
                weight,
            })
        })
    }

    /// States with a non-zero initial weight.
    pub fn initial_states(&self) -> Vec<(StateId, W)> {
        self.states()
            .filter(|s| s.is_initial())
            .map(|s| (s.id(), s.init_weight()))
            .collect()
    }

    /// States with a non-zero final weight.
    pub fn final_states(&self) -> Vec<(StateId, W)> {
        self.states()
            .filter(|s| s.is_final())
            .map(|s| (s.id(), s.final_weight()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Index-level plumbing shared by the algorithms
    // -----------------------------------------------------------------------

    pub(crate) fn id(&self, index: u32) -> StateId {
        StateId {
            tag: self.tag,
            index,
        }
    }

    /// Resolve a handle to a live arena index.
    pub(crate) fn check(&self, state: StateId) -> Result<u32> {
        if state.tag != self.tag {
            return Err(FsmError::ForeignState(state));
        }
        match self.nodes.get(state.index as usize) {
            Some(Some(_)) => Ok(state.index),
            _ => Err(FsmError::RemovedState(state)),
        }
    }

    /// Length of the arena including tombstones.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_live(&self, index: u32) -> bool {
        matches!(self.nodes.get(index as usize), Some(Some(_)))
    }

    pub(crate) fn live_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as u32)
    }

    /// Panics on a tombstone; callers only pass indices obtained from
    /// `check` or `live_indices`.
    pub(crate) fn node(&self, index: u32) -> &Node<W> {
        self.nodes[index as usize]
            .as_ref()
            .expect("arena index refers to a removed state")
    }

    pub(crate) fn node_mut(&mut self, index: u32) -> &mut Node<W> {
        self.nodes[index as usize]
            .as_mut()
            .expect("arena index refers to a removed state")
    }

    pub(crate) fn push_node(&mut self, node: Node<W>) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(Some(node));
        self.live += 1;
        index
    }

    pub(crate) fn push_arc(&mut self, src: u32, dst: u32, weight: W) {
        self.node_mut(src).arcs.push((dst, weight));
        self.node_mut(dst).preds.push(src);
        self.arc_count += 1;
    }

    /// Add `src -> dst`, folding the weight into an existing parallel arc.
    pub(crate) fn merge_arc(&mut self, src: u32, dst: u32, weight: W) {
        let node = self.node_mut(src);
        if let Some(slot) = node.arcs.iter_mut().find(|(d, _)| *d == dst) {
            slot.1 = slot.1.plus(&weight);
            return;
        }
        self.push_arc(src, dst, weight);
    }

    /// Incoming arcs of `index` as `(src, weight)`, grouped by source.
    pub(crate) fn incoming(&self, index: u32) -> Vec<(u32, W)> {
        let mut sources = self.node(index).preds.clone();
        sources.sort_unstable();
        sources.dedup();
        sources
            .into_iter()
            .flat_map(|p| {
                self.node(p)
                    .arcs
                    .iter()
                    .filter(move |(d, _)| *d == index)
                    .map(move |&(_, w)| (p, w))
            })
            .collect()
    }

    pub(crate) fn remove_index(&mut self, index: u32) {
        let node = self.nodes[index as usize]
            .take()
            .expect("arena index refers to a removed state");

        for &(d, _) in &node.arcs {
            if d == index {
                continue;
            }
            let preds = &mut self.node_mut(d).preds;
            if let Some(pos) = preds.iter().position(|&p| p == index) {
                preds.swap_remove(pos);
            }
        }
        self.arc_count -= node.arcs.len();

        let mut sources = node.preds;
        sources.sort_unstable();
        sources.dedup();
        for p in sources {
            if p == index {
                continue;
            }
            let arcs = &mut self.node_mut(p).arcs;
            let before = arcs.len();
            arcs.retain(|(d, _)| *d != index);
            self.arc_count -= before - arcs.len();
        }
        self.live -= 1;
    }

    /// Copy every live state and arc of `other` into `self`.
    ///
    /// Returns the arena index of each copied state, indexed by `other`'s
    /// arena index (`u32::MAX` for tombstones).
    pub(crate) fn absorb(&mut self, other: &Fsm<W>) -> Vec<u32> {
        let mut map = vec![u32::MAX; other.capacity()];
        for s in other.live_indices() {
            map[s as usize] = self.push_node(other.node(s).detached());
        }
        for s in other.live_indices() {
            for &(d, w) in &other.node(s).arcs {
                self.push_arc(map[s as usize], map[d as usize], w);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfsm_semiring::{LogWeight, ProbabilityWeight};

    fn w(v: f64) -> LogWeight {
        LogWeight::new(v)
    }

    #[test]
    fn add_state_and_arc() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::emitting("a", 0).initial(LogWeight::one()));
        let b = fsm.add_state(StateSpec::emitting("b", 1).accepting(LogWeight::one()));
        fsm.add_arc(a, b, w(-0.5)).unwrap();

        assert_eq!(fsm.num_states(), 2);
        assert_eq!(fsm.num_arcs(), 1);
        let arcs: Vec<_> = fsm.arcs(a).unwrap().collect();
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].dst, b);
        assert_eq!(arcs[0].weight, w(-0.5));
        assert_eq!(fsm.arcs_into(b).unwrap()[0].src, a);
        assert_eq!(fsm.state(a).unwrap().label(), Some("a"));
        assert_eq!(fsm.initial_states(), vec![(a, LogWeight::one())]);
        assert_eq!(fsm.final_states(), vec![(b, LogWeight::one())]);
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let mut one = Fsm::<LogWeight>::new();
        let mut other = Fsm::<LogWeight>::new();
        let a = one.add_state(StateSpec::new());
        let b = other.add_state(StateSpec::new());
        let err = one.add_arc(a, b, LogWeight::one()).unwrap_err();
        assert!(matches!(err, FsmError::ForeignState(s) if s == b));
        assert_eq!(one.num_arcs(), 0);
    }

    #[test]
    fn clone_is_a_distinct_instance() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::new());
        let copy = fsm.clone();
        assert_eq!(copy.num_states(), 1);
        assert!(matches!(copy.state(a), Err(FsmError::ForeignState(_))));
    }

    #[test]
    fn remove_state_drops_incoming_and_outgoing_arcs() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::new());
        let b = fsm.add_state(StateSpec::new());
        let c = fsm.add_state(StateSpec::new());
        fsm.add_arc(a, b, LogWeight::one()).unwrap();
        fsm.add_arc(b, c, LogWeight::one()).unwrap();
        fsm.add_arc(b, b, LogWeight::one()).unwrap();
        fsm.add_arc(a, c, LogWeight::one()).unwrap();

        fsm.remove_state(b).unwrap();

        assert_eq!(fsm.num_states(), 2);
        assert_eq!(fsm.num_arcs(), 1);
        assert!(fsm.arcs(a).unwrap().all(|arc| arc.dst == c));
        assert_eq!(fsm.arcs_into(c).unwrap().len(), 1);
        assert!(matches!(fsm.state(b), Err(FsmError::RemovedState(_))));
        assert!(matches!(
            fsm.add_arc(a, b, LogWeight::one()),
            Err(FsmError::RemovedState(_))
        ));
    }

    #[test]
    fn compact_renumbers_and_retires_handles() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::new().label("a"));
        let b = fsm.add_state(StateSpec::new());
        let c = fsm.add_state(StateSpec::new().label("c"));
        fsm.add_arc(a, c, w(-1.0)).unwrap();
        fsm.remove_state(b).unwrap();

        let ids = fsm.compact();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1].index(), 1);
        assert!(!fsm.contains(a));
        let arcs: Vec<_> = fsm.arcs(ids[0]).unwrap().collect();
        assert_eq!(arcs[0].dst, ids[1]);
        assert_eq!(fsm.state(ids[1]).unwrap().label(), Some("c"));
        assert_eq!(fsm.arcs_into(ids[1]).unwrap().len(), 1);
    }

    #[test]
    fn merge_arc_folds_parallel_weights() {
        let mut fsm = Fsm::<LogWeight>::new();
        let a = fsm.add_state(StateSpec::new());
        let b = fsm.add_state(StateSpec::new());
        let (ai, bi) = (fsm.check(a).unwrap(), fsm.check(b).unwrap());
        fsm.merge_arc(ai, bi, LogWeight::from_probability(0.25));
        fsm.merge_arc(ai, bi, LogWeight::from_probability(0.25));
        assert_eq!(fsm.num_arcs(), 1);
        let arc = fsm.arcs(a).unwrap().next().unwrap();
        assert!(arc.weight.approx_eq(&w(0.5f64.ln()), 1e-12));
    }
}
