//! Fault tree analysis orchestration.
//!
//! Runs the full pipeline: CCF expansion, Boolean graph construction,
//! preprocessing, BDD construction, ZBDD minimal cut sets, and the
//! optional probability and importance calculations. One analysis per
//! [`FaultTreeAnalysis`] instance; rerun on a changed model by building
//! a new instance.

use hashbrown::HashMap;
use log::debug;

use crate::bdd::Bdd;
use crate::error::Error;
use crate::graph::Graph;
use crate::importance::{self, ImportanceFactors};
use crate::model::Model;
use crate::preprocess;
use crate::zbdd::Zbdd;

/// Cut-set generation engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Algorithm {
    Bdd,
    Zbdd,
    Mocus,
}

/// Analysis configuration consumed by the core.
#[derive(Debug, Clone)]
pub struct Settings {
    pub(crate) algorithm: Algorithm,
    pub(crate) limit_order: usize,
    pub(crate) cut_off: f64,
    pub(crate) probability_analysis: bool,
    pub(crate) importance_analysis: bool,
    pub(crate) ccf_analysis: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Bdd,
            limit_order: 20,
            cut_off: 1e-8,
            probability_analysis: false,
            importance_analysis: false,
            ccf_analysis: false,
        }
    }
}

impl Settings {
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Maximum cut-set cardinality retained.
    pub fn limit_order(mut self, limit: usize) -> Result<Self, Error> {
        if limit < 1 {
            return Err(Error::InvalidSettings("limit order must be at least 1".into()));
        }
        self.limit_order = limit;
        Ok(self)
    }

    /// Probability below which a cut set is discarded.
    pub fn cut_off(mut self, cut_off: f64) -> Result<Self, Error> {
        if !(0.0..1.0).contains(&cut_off) {
            return Err(Error::InvalidSettings(format!("cut-off {} is not in [0, 1)", cut_off)));
        }
        self.cut_off = cut_off;
        Ok(self)
    }

    pub fn probability_analysis(mut self, on: bool) -> Self {
        self.probability_analysis = on;
        self
    }

    /// Importance analysis implies probability propagation.
    pub fn importance_analysis(mut self, on: bool) -> Self {
        self.importance_analysis = on;
        self
    }

    pub fn ccf_analysis(mut self, on: bool) -> Self {
        self.ccf_analysis = on;
        self
    }
}

/// Signed basic-event reference inside a cut set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub event: String,
    pub complement: bool,
}

/// One minimal cut set, literals sorted by event id.
pub type CutSet = Vec<Literal>;

/// Results of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Minimal cut sets; enumeration order is unspecified.
    pub cut_sets: Vec<CutSet>,
    /// Per-cut-set probabilities, aligned with `cut_sets`; filled when
    /// probability analysis is on.
    pub mcs_probabilities: Vec<f64>,
    /// Sum of cut-set probabilities (the rare-event approximation).
    pub sum_mcs_probability: Option<f64>,
    /// Exact top-event probability from BDD propagation.
    pub probability: Option<f64>,
    /// Importance vectors of basic events occurring in the cut sets.
    pub importance: HashMap<String, ImportanceFactors>,
    pub warnings: Vec<String>,
    /// Largest retained cut-set cardinality.
    pub max_order: usize,
}

/// The analysis facility: one validated model, one run.
pub struct FaultTreeAnalysis {
    model: Model,
    settings: Settings,
}

impl FaultTreeAnalysis {
    pub fn new(model: Model, settings: Settings) -> Result<Self, Error> {
        if settings.algorithm != Algorithm::Bdd {
            return Err(Error::UnsupportedAlgorithm(settings.algorithm));
        }
        model.validate()?;
        Ok(Self { model, settings })
    }

    /// Runs the analysis and produces minimal cut sets with the
    /// requested quantifications.
    pub fn analyze(&self) -> Result<Analysis, Error> {
        let model = if self.settings.ccf_analysis && !self.model.ccf_groups().is_empty() {
            self.model.expand_ccf()?
        } else {
            self.model.clone()
        };

        let mut graph = Graph::from_model(&model)?;
        preprocess::run(&mut graph);
        debug!("preprocessed graph:\n{}", graph);

        let bdd = Bdd::from_graph(&graph);
        #[cfg(debug_assertions)]
        bdd.test_structure(bdd.root());

        let mut analysis = Analysis::default();
        let needs_probability = self.settings.probability_analysis || self.settings.importance_analysis;
        let p_by_order: HashMap<u32, f64> = graph
            .var_order()
            .iter()
            .map(|(&index, &order)| (order, graph.variable_p(index)))
            .collect();

        // Constant top events short-circuit cut set generation.
        if bdd.is_zero(bdd.root()) {
            analysis.warnings.push("The top event is NULL. Success is guaranteed.".to_string());
            if needs_probability {
                analysis.probability = Some(0.0);
                analysis.sum_mcs_probability = Some(0.0);
            }
            return Ok(analysis);
        }
        if bdd.is_one(bdd.root()) {
            analysis.warnings.push("The top event is UNITY. Failure is guaranteed.".to_string());
            analysis.cut_sets.push(Vec::new());
            if needs_probability {
                analysis.probability = Some(1.0);
                analysis.mcs_probabilities.push(1.0);
                analysis.sum_mcs_probability = Some(1.0);
            }
            return Ok(analysis);
        }

        let cut_sets_orders = self.find_mcs(&graph, &bdd);

        for orders in &cut_sets_orders {
            let mut literals: Vec<Literal> = orders
                .iter()
                .map(|&order| Literal {
                    event: graph
                        .variable_event(bdd.variable_index(order).expect("basic variable order"))
                        .to_string(),
                    complement: false,
                })
                .collect();
            literals.sort();
            analysis.max_order = analysis.max_order.max(literals.len());
            analysis.cut_sets.push(literals);
        }
        debug!("{} minimal cut sets of order <= {}", analysis.cut_sets.len(), analysis.max_order);

        if needs_probability {
            analysis.probability = Some(bdd.top_probability(&p_by_order));
            let mut sum = 0.0;
            for cut_set in &analysis.cut_sets {
                let p = cut_set_probability(&model, cut_set);
                sum += p;
                analysis.mcs_probabilities.push(p);
            }
            analysis.sum_mcs_probability = Some(sum);
        }

        if self.settings.importance_analysis {
            analysis.importance = importance::analyze(&bdd, &graph, &p_by_order, &analysis.cut_sets);
        }

        Ok(analysis)
    }

    /// Minimal cut sets as sets of ordering positions: ZBDD conversion,
    /// subsumption, module substitution, truncation.
    fn find_mcs(&self, graph: &Graph, bdd: &Bdd) -> Vec<Vec<u32>> {
        let (mut zbdd, root_family) = Zbdd::from_bdd(bdd, bdd.root());
        let root_family = zbdd.minimize(root_family);

        // Modules arrive inner-first, so each family below expands with
        // the already-expanded families of its inner modules.
        let mut module_sets: HashMap<u32, Vec<Vec<u32>>> = HashMap::new();
        let mut memo = HashMap::new();
        for &(order, module_root) in bdd.modules() {
            let family = zbdd.convert(bdd, module_root, &mut memo);
            let family = zbdd.minimize(family);
            let expanded: Vec<Vec<u32>> = zbdd
                .sets(family)
                .flat_map(|s| expand_set(&s, bdd, &module_sets))
                .collect();
            module_sets.insert(order, expanded);
        }

        let limit = self.settings.limit_order;
        let cut_off = self.settings.cut_off;
        zbdd.sets(root_family)
            .flat_map(|s| expand_set(&s, bdd, &module_sets))
            .filter(|s| s.len() <= limit)
            .filter(|s| {
                cut_off <= 0.0 || {
                    let p: f64 = s
                        .iter()
                        .map(|&order| {
                            graph.variable_p(bdd.variable_index(order).expect("basic variable order"))
                        })
                        .product();
                    p >= cut_off
                }
            })
            .collect()
    }
}

/// Cartesian substitution of module pseudo-variables by their own
/// minimal cut sets. Module variables are disjoint from the rest of the
/// graph, so substitution preserves minimality.
fn expand_set(set: &[u32], bdd: &Bdd, module_sets: &HashMap<u32, Vec<Vec<u32>>>) -> Vec<Vec<u32>> {
    let mut result: Vec<Vec<u32>> = vec![Vec::new()];
    for &order in set {
        if bdd.is_module_order(order) {
            let subs = &module_sets[&order];
            let mut next = Vec::with_capacity(result.len() * subs.len());
            for prefix in &result {
                for sub in subs {
                    let mut combined = prefix.clone();
                    combined.extend_from_slice(sub);
                    next.push(combined);
                }
            }
            result = next;
        } else {
            for prefix in &mut result {
                prefix.push(order);
            }
        }
    }
    result
}

fn cut_set_probability(model: &Model, cut_set: &CutSet) -> f64 {
    cut_set
        .iter()
        .map(|literal| {
            let p = model.basic_events()[&literal.event].p();
            if literal.complement {
                1.0 - p
            } else {
                p
            }
        })
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Arg, Connective, Formula};

    #[test]
    fn test_settings_validation() {
        assert!(Settings::default().limit_order(0).is_err());
        assert!(Settings::default().cut_off(1.0).is_err());
        assert!(Settings::default().cut_off(0.0).is_ok());
    }

    #[test]
    fn test_non_bdd_algorithms_rejected() {
        let mut model = Model::new("top");
        model.add_basic_event("a", 0.1).unwrap();
        model
            .add_gate("top", Formula::new(Connective::Null).arg(Arg::basic("a")))
            .unwrap();
        let settings = Settings::default().algorithm(Algorithm::Mocus);
        assert!(matches!(
            FaultTreeAnalysis::new(model, settings),
            Err(Error::UnsupportedAlgorithm(Algorithm::Mocus))
        ));
    }

    #[test]
    fn test_literal_ordering() {
        let a = Literal { event: "a".into(), complement: false };
        let b = Literal { event: "b".into(), complement: false };
        assert!(a < b);
    }
}
