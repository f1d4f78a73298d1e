// Packed arc table: dense plain-old-data export of an FSM for decoders.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use wfsm_semiring::FloatWeight;

use crate::fsm::{Fsm, Node};
use crate::{FsmError, Result};

/// Table magic ("WFSM", little-endian).
const MAGIC: u32 = 0x4D53_4657;

/// Current table layout version.
const VERSION: u32 = 1;

/// Size of the table header in bytes.
///
/// - bytes 0..4: magic
/// - bytes 4..8: layout version
/// - bytes 8..12: state count
/// - bytes 12..16: arc count
pub const HEADER_SIZE: usize = 16;

/// `pdf_index` value of a non-emitting state.
pub const NO_PDF: u32 = u32::MAX;

/// One state (32 bytes). Its outgoing arcs are
/// `arcs[first_arc..first_arc + num_arcs]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PackedState {
    pub first_arc: u32,
    pub num_arcs: u32,
    /// [`NO_PDF`] for non-emitting states.
    pub pdf_index: u32,
    pub _reserved: u32,
    pub init_weight: f64,
    pub final_weight: f64,
}

impl PackedState {
    #[inline]
    pub fn pdf(&self) -> Option<u32> {
        (self.pdf_index != NO_PDF).then_some(self.pdf_index)
    }
}

/// One arc (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PackedArc {
    pub dst: u32,
    pub _reserved: u32,
    pub weight: f64,
}

/// Dense, renumbered copy of an FSM's states and arcs.
///
/// Weights are stored as the raw `f64` of their [`FloatWeight`]
/// representation. Labels are not carried; decoders address output
/// distributions through `pdf_index`.
pub struct ArcTable<W> {
    states: Vec<PackedState>,
    arcs: Vec<PackedArc>,
    _weight: PhantomData<W>,
}

impl<W> std::fmt::Debug for ArcTable<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcTable")
            .field("state_count", &self.states.len())
            .field("arc_count", &self.arcs.len())
            .finish()
    }
}

impl<W: FloatWeight> ArcTable<W> {
    /// Pack the live states of `fsm` in arena order.
    pub fn compile(fsm: &Fsm<W>) -> Self {
        let mut remap = vec![u32::MAX; fsm.capacity()];
        for (dense, s) in fsm.live_indices().enumerate() {
            remap[s as usize] = dense as u32;
        }

        let mut states = Vec::with_capacity(fsm.num_states());
        let mut arcs = Vec::with_capacity(fsm.num_arcs());
        for s in fsm.live_indices() {
            let node = fsm.node(s);
            states.push(PackedState {
                first_arc: arcs.len() as u32,
                num_arcs: node.arcs.len() as u32,
                pdf_index: node.pdf_index.unwrap_or(NO_PDF),
                _reserved: 0,
                init_weight: node.init_weight.value(),
                final_weight: node.final_weight.value(),
            });
            arcs.extend(node.arcs.iter().map(|&(d, w)| PackedArc {
                dst: remap[d as usize],
                _reserved: 0,
                weight: w.value(),
            }));
        }
        tracing::debug!(states = states.len(), arcs = arcs.len(), "compiled arc table");
        Self {
            states,
            arcs,
            _weight: PhantomData,
        }
    }

    /// Load a table from bytes produced by [`to_bytes`](Self::to_bytes).
    ///
    /// The data is copied into aligned storage and every arc range and
    /// destination is bounds-checked.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(invalid(format!(
                "expected at least {HEADER_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let word = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        if word(0) != MAGIC {
            return Err(invalid("bad magic number".to_string()));
        }
        if word(4) != VERSION {
            return Err(invalid(format!("unsupported version {}", word(4))));
        }
        let state_count = word(8) as usize;
        let arc_count = word(12) as usize;

        let states_len = state_count * size_of::<PackedState>();
        let arcs_len = arc_count * size_of::<PackedArc>();
        let expected = HEADER_SIZE + states_len + arcs_len;
        if data.len() != expected {
            return Err(invalid(format!(
                "expected {expected} bytes for {state_count} states and {arc_count} arcs, got {}",
                data.len()
            )));
        }

        // Copy into aligned Vecs
        let mut states = vec![PackedState::zeroed(); state_count];
        bytemuck::cast_slice_mut::<PackedState, u8>(&mut states)
            .copy_from_slice(&data[HEADER_SIZE..HEADER_SIZE + states_len]);
        let mut arcs = vec![PackedArc::zeroed(); arc_count];
        bytemuck::cast_slice_mut::<PackedArc, u8>(&mut arcs)
            .copy_from_slice(&data[HEADER_SIZE + states_len..]);

        for (i, state) in states.iter().enumerate() {
            let end = state.first_arc as usize + state.num_arcs as usize;
            if end > arc_count {
                return Err(invalid(format!("state {i} arc range ends at {end} of {arc_count}")));
            }
        }
        if let Some(arc) = arcs.iter().find(|a| a.dst as usize >= state_count) {
            return Err(invalid(format!("arc destination {} out of range", arc.dst)));
        }

        Ok(Self {
            states,
            arcs,
            _weight: PhantomData,
        })
    }

    /// Serialize as header, state records, then arc records.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_SIZE
                + self.states.len() * size_of::<PackedState>()
                + self.arcs.len() * size_of::<PackedArc>(),
        );
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.states.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.arcs.len() as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::cast_slice(&self.states));
        out.extend_from_slice(bytemuck::cast_slice(&self.arcs));
        out
    }

    /// Rebuild an (unlabeled) FSM from the table.
    pub fn to_fsm(&self) -> Fsm<W> {
        let mut fsm = Fsm::new();
        for state in &self.states {
            fsm.push_node(Node {
                label: None,
                pdf_index: state.pdf(),
                init_weight: W::from_value(state.init_weight),
                final_weight: W::from_value(state.final_weight),
                arcs: Vec::new(),
                preds: Vec::new(),
            });
        }
        for s in 0..self.states.len() as u32 {
            for arc in self.arcs_of(s) {
                fsm.push_arc(s, arc.dst, W::from_value(arc.weight));
            }
        }
        fsm
    }
}

impl<W> ArcTable<W> {
    pub fn states(&self) -> &[PackedState] {
        &self.states
    }

    pub fn arcs(&self) -> &[PackedArc] {
        &self.arcs
    }

    /// Outgoing arcs of dense state `state`; empty when out of range.
    pub fn arcs_of(&self, state: u32) -> &[PackedArc] {
        match self.states.get(state as usize) {
            Some(s) => {
                let start = s.first_arc as usize;
                &self.arcs[start..start + s.num_arcs as usize]
            }
            None => &[],
        }
    }
}

fn invalid(msg: String) -> FsmError {
    FsmError::InvalidTable(msg)
}
