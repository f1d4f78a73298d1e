// Serde support for `Fsm`, as a dense list of states plus index-based arcs.
//
// Log-semiring `zero` is `-inf`, which formats without a non-finite float
// representation (JSON among them) cannot carry.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use wfsm_semiring::Semiring;

use crate::fsm::{Fsm, Node};

#[derive(Serialize, Deserialize)]
struct StateRepr<W> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pdf_index: Option<u32>,
    init_weight: W,
    final_weight: W,
}

#[derive(Serialize, Deserialize)]
struct ArcRepr<W> {
    src: u32,
    dst: u32,
    weight: W,
}

#[derive(Serialize, Deserialize)]
struct FsmRepr<W> {
    states: Vec<StateRepr<W>>,
    arcs: Vec<ArcRepr<W>>,
}

impl<W: Semiring + Serialize> Serialize for Fsm<W> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut remap = vec![u32::MAX; self.capacity()];
        for (dense, s) in self.live_indices().enumerate() {
            remap[s as usize] = dense as u32;
        }
        let states = self
            .live_indices()
            .map(|s| {
                let node = self.node(s);
                StateRepr {
                    label: node.label.clone(),
                    pdf_index: node.pdf_index,
                    init_weight: node.init_weight,
                    final_weight: node.final_weight,
                }
            })
            .collect();
        let arcs = self
            .live_indices()
            .flat_map(|s| {
                let src = remap[s as usize];
                self.node(s).arcs.iter().map(move |&(d, weight)| (src, d, weight))
            })
            .map(|(src, d, weight)| ArcRepr {
                src,
                dst: remap[d as usize],
                weight,
            })
            .collect();
        FsmRepr { states, arcs }.serialize(serializer)
    }
}

impl<'de, W: Semiring + Deserialize<'de>> Deserialize<'de> for Fsm<W> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = FsmRepr::<W>::deserialize(deserializer)?;
        let count = repr.states.len() as u32;
        let mut fsm = Fsm::new();
        for state in repr.states {
            fsm.push_node(Node {
                label: state.label,
                pdf_index: state.pdf_index,
                init_weight: state.init_weight,
                final_weight: state.final_weight,
                arcs: Vec::new(),
                preds: Vec::new(),
            });
        }
        for arc in repr.arcs {
            if arc.src >= count || arc.dst >= count {
                return Err(D::Error::custom(format!(
                    "arc {} -> {} refers to a state outside 0..{count}",
                    arc.src, arc.dst
                )));
            }
            fsm.push_arc(arc.src, arc.dst, arc.weight);
        }
        Ok(fsm)
    }
}
