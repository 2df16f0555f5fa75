//! Per-basic-event importance measures.
//!
//! All measures derive from three numbers per event: the top-event
//! probability `P`, and the conditionals `P(0_e)` / `P(1_e)` with the
//! event's probability pinned to 0 or 1. The conditionals come from the
//! same memoized BDD as `P`, re-propagated with the pinned value (module
//! pseudo-variables recompute bottom-up, so events inside modules work
//! the same way).

use hashbrown::HashMap;

use crate::analysis::CutSet;
use crate::bdd::Bdd;
use crate::graph::Graph;

/// Importance vector of one basic event.
#[derive(Debug, Clone, Default)]
pub struct ImportanceFactors {
    /// Number of minimal cut sets containing the event.
    pub occurrences: usize,
    /// Birnbaum marginal importance: `∂P/∂p = P(1_e) - P(0_e)`.
    pub birnbaum: f64,
    /// Criticality importance: `birnbaum · p_e / P`.
    pub criticality: f64,
    /// Fussell-Vesely diagnosis importance: `(P - P(0_e)) / P`.
    pub fussell_vesely: f64,
    /// Risk achievement worth: `P(1_e) / P`.
    pub raw: f64,
    /// Risk reduction worth: `P / P(0_e)`; infinite when the event is
    /// indispensable.
    pub rrw: f64,
}

/// Computes the importance vector for every basic event occurring in the
/// minimal cut sets.
pub(crate) fn analyze(
    bdd: &Bdd,
    graph: &Graph,
    p_by_order: &HashMap<u32, f64>,
    cut_sets: &[CutSet],
) -> HashMap<String, ImportanceFactors> {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for cut_set in cut_sets {
        for literal in cut_set {
            *occurrences.entry(literal.event.clone()).or_insert(0) += 1;
        }
    }

    let p_top = bdd.top_probability(p_by_order);
    let mut result = HashMap::new();
    for (event, count) in occurrences {
        let var = graph.variable_of_event(&event).expect("cut set event is in the graph");
        let order = bdd.variable_order(var).expect("cut set variable is ordered");
        let p_event = graph.variable_p(var);

        let mut pinned = p_by_order.clone();
        pinned.insert(order, 0.0);
        let p_low = bdd.top_probability(&pinned);
        pinned.insert(order, 1.0);
        let p_high = bdd.top_probability(&pinned);

        result.insert(event, measure(count, p_top, p_low, p_high, p_event));
    }
    result
}

fn measure(occurrences: usize, p_top: f64, p_low: f64, p_high: f64, p_event: f64) -> ImportanceFactors {
    let birnbaum = p_high - p_low;
    if p_top <= 0.0 {
        return ImportanceFactors {
            occurrences,
            birnbaum,
            ..Default::default()
        };
    }
    ImportanceFactors {
        occurrences,
        birnbaum,
        criticality: birnbaum * p_event / p_top,
        fussell_vesely: (p_top - p_low) / p_top,
        raw: p_high / p_top,
        rrw: if p_low > 0.0 { p_top / p_low } else { f64::INFINITY },
    }
}
