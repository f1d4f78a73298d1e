// Build a small pronunciation lexicon, expand words into phone models,
// minimize, and export the packed arc table.
//
// Run:
//   cargo run -p wfsm --example lexicon_graph [out.bin]

use wfsm::{
    ArcTable, Fsm, HashMap, LogWeight, MinimizeConfig, ProbabilityWeight, Semiring, StateId,
    StateSpec, add_self_loops, compose, minimize, sequence_weights, union,
};

/// Phone inventory; the position is the pdf index.
const PHONES: [&str; 6] = ["k", "ae", "t", "b", "r", "s"];

fn pdf(phone: &str) -> u32 {
    PHONES.iter().position(|p| *p == phone).unwrap_or(0) as u32
}

/// A chain of states labeled with `units`, entered with `weight`.
fn chain(units: &[&str], weight: f64) -> Fsm<LogWeight> {
    let mut fsm = Fsm::new();
    let mut prev: Option<StateId> = None;
    for (i, unit) in units.iter().enumerate() {
        let mut spec = StateSpec::new().label(*unit);
        if i == 0 {
            spec = spec.initial(LogWeight::from_probability(weight));
        }
        if i + 1 == units.len() {
            spec = spec.accepting(LogWeight::one());
        }
        let s = fsm.add_state(spec);
        if let Some(prev) = prev {
            fsm.add_arc(prev, s, LogWeight::one()).unwrap();
        }
        prev = Some(s);
    }
    fsm
}

/// One emitting state per phone.
fn phone_model(phone: &str) -> Fsm<LogWeight> {
    let mut fsm = Fsm::new();
    fsm.add_state(
        StateSpec::emitting(format!("{phone}:emit"), pdf(phone))
            .initial(LogWeight::one())
            .accepting(LogWeight::one()),
    );
    fsm
}

fn main() {
    let lexicon = [
        ("cat", &["k", "ae", "t"][..], 0.4),
        ("bat", &["b", "ae", "t"][..], 0.3),
        ("cats", &["k", "ae", "t", "s"][..], 0.2),
        ("rat", &["r", "ae", "t"][..], 0.1),
    ];

    let words: Vec<Fsm<LogWeight>> = lexicon.iter().map(|(w, _, p)| chain(&[*w], *p)).collect();
    let refs: Vec<&Fsm<LogWeight>> = words.iter().collect();
    let top = union(&refs);

    let mut subs: HashMap<String, Fsm<LogWeight>> = lexicon
        .iter()
        .map(|(w, phones, _)| (w.to_string(), chain(phones, 1.0)))
        .collect();
    for phone in PHONES {
        subs.insert(phone.to_string(), phone_model(phone));
    }

    let expanded = compose(&top, &subs).expect("substitutions are not recursive");
    println!(
        "expanded: {} states, {} arcs",
        expanded.num_states(),
        expanded.num_arcs()
    );

    let min = minimize(&expanded, &MinimizeConfig::default()).expect("lexicon is acyclic");
    println!("minimized: {} states, {} arcs", min.num_states(), min.num_arcs());

    let mut seqs: Vec<_> = sequence_weights(&min)
        .expect("lexicon is acyclic")
        .into_iter()
        .collect();
    seqs.sort_by(|a, b| b.1.value().total_cmp(&a.1.value()));
    for (seq, w) in &seqs {
        println!("  {:30} p={:.3}", seq.join(" "), w.to_probability());
    }

    let mut decoding = min;
    let loops = add_self_loops(&mut decoding, 0.6).expect("valid loop probability");
    let table = ArcTable::compile(&decoding);
    println!(
        "decoding graph: {loops} self-loops, {} packed states, {} packed arcs",
        table.states().len(),
        table.arcs().len()
    );

    if let Some(path) = std::env::args().nth(1) {
        std::fs::write(&path, table.to_bytes()).expect("failed to write arc table");
        println!("wrote {path}");
    }
}
