//! Probability propagation over BDD functions.
//!
//! Post-order traversal memoized per vertex:
//! `P(ite) = p_v·P(high) + (1-p_v)·P(low)`, with the complement of a
//! negated reference folded in as `1 - P`. Probabilities are keyed by
//! ordering position; module pseudo-variables take the probability of
//! their module's root function.

use hashbrown::HashMap;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Exact probability of a function under independent variable
    /// probabilities keyed by ordering position.
    ///
    /// Every variable occurring in the function must have an entry.
    pub fn probability(&self, f: Ref, p_by_order: &HashMap<u32, f64>) -> f64 {
        let mut memo = HashMap::new();
        self.prob(f, p_by_order, &mut memo)
    }

    fn prob(&self, f: Ref, p: &HashMap<u32, f64>, memo: &mut HashMap<u32, f64>) -> f64 {
        if self.is_one(f) {
            return 1.0;
        }
        if self.is_zero(f) {
            return 0.0;
        }
        let i = f.index();
        let positive = if let Some(&cached) = memo.get(&i) {
            cached
        } else {
            let order = self.order(i);
            let p_v = p
                .get(&order)
                .copied()
                .expect("probability for every variable in the function");
            let high = self.prob(self.high(i), p, memo);
            let low = self.prob(self.low(i), p, memo);
            let value = p_v * high + (1.0 - p_v) * low;
            memo.insert(i, value);
            value
        };
        if f.is_negated() {
            1.0 - positive
        } else {
            positive
        }
    }

    /// Probability of the root function with module pseudo-variables
    /// resolved bottom-up (inner modules first).
    pub fn top_probability(&self, p_basic: &HashMap<u32, f64>) -> f64 {
        let mut p = p_basic.clone();
        for &(order, module_root) in self.modules() {
            let value = self.probability(module_root, &p);
            p.insert(order, value);
        }
        self.probability(self.root(), &p)
    }
}
