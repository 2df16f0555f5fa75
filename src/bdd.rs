//! Reduced Ordered BDD with complement edges over the preprocessed
//! Boolean graph.
//!
//! The manager owns the vertex arena (the unique table) and the two
//! compute caches (AND and OR). All operations go through the manager to
//! keep the diagram reduced and canonical:
//!
//! - the `high` edge of a vertex is never complemented; [`Bdd::mk_node`]
//!   flips a negated pair and returns the outer complement instead,
//! - vertices with equal cofactors are never created,
//! - the unique table returns the same vertex for the same
//!   `(order, high, signed low)` triple.
//!
//! Functions are [`Ref`]s: the complement bit rides on the reference, so
//! the single terminal `One` at arena index 1 doubles as logical zero
//! through its negation.

use hashbrown::HashMap;
use log::debug;

use crate::cache::ComputedTable;
use crate::graph::{GateType, Graph, State};
use crate::node::Ite;
use crate::reference::Ref;
use crate::storage::Storage;

/// Binary Boolean operator of the compute caches.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Op {
    And,
    Or,
}

pub struct Bdd {
    storage: Storage<Ite>,
    and_table: ComputedTable,
    or_table: ComputedTable,
    pub one: Ref,
    pub zero: Ref,
    root: Ref,
    /// Graph variable index -> position in the ordering.
    index_to_order: HashMap<u32, u32>,
    /// Position in the ordering -> graph variable index.
    order_to_index: HashMap<u32, u32>,
    /// Module pseudo-variables in creation (post-) order:
    /// `(pseudo order, module root function)`.
    modules: Vec<(u32, Ref)>,
    module_orders: HashMap<u32, Ref>,
    /// Number of basic variables; pseudo-variable orders start above.
    num_vars: u32,
}

impl Bdd {
    pub fn new(storage_bits: usize) -> Self {
        let mut storage = Storage::new(storage_bits);
        let terminal = storage.add(Ite::terminal());
        assert_eq!(terminal, 1, "The terminal vertex must be (1)");
        let one = Ref::positive(1);

        Self {
            storage,
            and_table: ComputedTable::new(16),
            or_table: ComputedTable::new(16),
            one,
            zero: -one,
            root: one,
            index_to_order: HashMap::new(),
            order_to_index: HashMap::new(),
            modules: Vec::new(),
            module_orders: HashMap::new(),
            num_vars: 0,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Bdd {
    pub fn order(&self, index: u32) -> u32 {
        self.storage.value(index as usize).order
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.value(index as usize).high
    }

    /// Low child with the node's own complement distributed onto it.
    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    /// High child with the node's own complement distributed onto it.
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_zero(node) || self.is_one(node)
    }

    /// The root function of the converted fault tree.
    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Module functions in dependency order (inner modules first).
    pub fn modules(&self) -> &[(u32, Ref)] {
        &self.modules
    }

    /// The root function of the module behind a pseudo-variable.
    pub fn module_root(&self, order: u32) -> Option<Ref> {
        self.module_orders.get(&order).copied()
    }

    pub fn is_module_order(&self, order: u32) -> bool {
        order > self.num_vars
    }

    /// Graph variable index behind an ordering position.
    pub fn variable_index(&self, order: u32) -> Option<u32> {
        self.order_to_index.get(&order).copied()
    }

    pub fn variable_order(&self, index: u32) -> Option<u32> {
        self.index_to_order.get(&index).copied()
    }
}

impl Bdd {
    /// Fetches or creates the vertex `(order, high, low)`, restoring
    /// canonical form when the high edge arrives complemented.
    pub fn mk_node(&mut self, order: u32, low: Ref, high: Ref) -> Ref {
        debug!("mk(order = {}, low = {}, high = {})", order, low, high);
        assert_ne!(order, 0, "Order must not be zero");

        if high.is_negated() {
            return -self.mk_node(order, -low, -high);
        }
        if low == high {
            return low;
        }

        let i = self.storage.put(Ite::new(order, high, low));
        Ref::positive(i as u32)
    }

    pub fn mk_var(&mut self, order: u32) -> Ref {
        self.mk_node(order, self.zero, self.one)
    }

    /// Shannon cofactors of `node` by the variable at `order`.
    ///
    /// Identity when the node roots below that position.
    pub fn top_cofactors(&self, node: Ref, order: u32) -> (Ref, Ref) {
        assert_ne!(order, 0);
        let i = node.index();
        if self.is_terminal(node) || order < self.order(i) {
            return (node, node);
        }
        assert_eq!(order, self.order(i));
        if node.is_negated() {
            (-self.low(i), -self.high(i))
        } else {
            (self.low(i), self.high(i))
        }
    }

    pub fn apply(&mut self, op: Op, f: Ref, g: Ref) -> Ref {
        match op {
            Op::And => self.apply_and(f, g),
            Op::Or => self.apply_or(f, g),
        }
    }

    pub fn apply_and(&mut self, f: Ref, g: Ref) -> Ref {
        debug!("apply_and(f = {}, g = {})", f, g);

        // Terminal cases.
        if self.is_one(f) {
            return g;
        }
        if self.is_one(g) {
            return f;
        }
        if self.is_zero(f) || self.is_zero(g) {
            return self.zero;
        }
        if f == g {
            return f;
        }
        if f == -g {
            return self.zero;
        }

        // Canonical argument order maximizes table hits.
        let (f, g) = if f.as_lit() <= g.as_lit() { (f, g) } else { (g, f) };

        if let Some(res) = self.and_table.get(f, g) {
            debug!("cache: apply_and(f = {}, g = {}) -> {}", f, g, res);
            return res;
        }

        let m = self.order(f.index()).min(self.order(g.index()));
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);

        let high = self.apply_and(f1, g1);
        let low = self.apply_and(f0, g0);
        let res = self.mk_node(m, low, high);

        self.and_table.insert(f, g, res);
        res
    }

    pub fn apply_or(&mut self, f: Ref, g: Ref) -> Ref {
        debug!("apply_or(f = {}, g = {})", f, g);

        // Terminal cases.
        if self.is_zero(f) {
            return g;
        }
        if self.is_zero(g) {
            return f;
        }
        if self.is_one(f) || self.is_one(g) {
            return self.one;
        }
        if f == g {
            return f;
        }
        if f == -g {
            return self.one;
        }

        let (f, g) = if f.as_lit() <= g.as_lit() { (f, g) } else { (g, f) };

        if let Some(res) = self.or_table.get(f, g) {
            debug!("cache: apply_or(f = {}, g = {}) -> {}", f, g, res);
            return res;
        }

        let m = self.order(f.index()).min(self.order(g.index()));
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);

        let high = self.apply_or(f1, g1);
        let low = self.apply_or(f0, g0);
        let res = self.mk_node(m, low, high);

        self.or_table.insert(f, g, res);
        res
    }

    /// Evaluates the function under a complete assignment by ordering
    /// position.
    pub fn evaluate(&self, f: Ref, assignment: &HashMap<u32, bool>) -> bool {
        let mut node = f;
        loop {
            if self.is_one(node) {
                return true;
            }
            if self.is_zero(node) {
                return false;
            }
            let v = self.order(node.index());
            node = if assignment[&v] {
                self.high_node(node)
            } else {
                self.low_node(node)
            };
        }
    }
}

impl Bdd {
    /// Builds the ROBDD of a preprocessed Boolean graph.
    ///
    /// The graph must carry a variable ordering; gates are AND/OR (or a
    /// bare literal/constant root). Module gates become pseudo-variables
    /// ordered after all basic variables, each with its own root
    /// function registered in [`Bdd::modules`].
    pub fn from_graph(graph: &Graph) -> Self {
        let mut bdd = Bdd::default();
        bdd.index_to_order = graph.var_order().clone();
        bdd.order_to_index = graph.var_order().iter().map(|(&i, &o)| (o, i)).collect();
        bdd.num_vars = graph.var_order().values().copied().max().unwrap_or(0);

        let root = graph.root();
        let index = root.unsigned_abs();
        let mut memo: HashMap<u32, Ref> = HashMap::new();
        let mut pseudo: HashMap<u32, u32> = HashMap::new();
        let f = if graph.is_constant(index) {
            if graph.constant_value(index) {
                bdd.one
            } else {
                bdd.zero
            }
        } else if graph.is_variable(index) {
            let order = bdd.index_to_order[&index];
            bdd.mk_var(order)
        } else {
            match graph.gate(index).state() {
                State::Null => bdd.zero,
                State::Unity => bdd.one,
                State::Normal => bdd.convert_gate(graph, index, &mut memo, &mut pseudo),
            }
        };
        bdd.root = if root < 0 { -f } else { f };
        debug!("BDD root = {} over {} vertices", bdd.root, bdd.storage.size());
        bdd
    }

    fn convert_gate(
        &mut self,
        graph: &Graph,
        gate: u32,
        memo: &mut HashMap<u32, Ref>,
        pseudo: &mut HashMap<u32, u32>,
    ) -> Ref {
        if let Some(&f) = memo.get(&gate) {
            return f;
        }
        let op = match graph.gate(gate).gate_type() {
            GateType::And => Op::And,
            GateType::Or => Op::Or,
            GateType::Null => Op::Or, // Single argument; the fold is the identity.
            other => unreachable!("gate type {:?} must not survive preprocessing", other),
        };
        let args: Vec<i32> = graph.gate(gate).args().to_vec();
        assert!(!args.is_empty(), "constant gates are handled by their state");

        let mut acc: Option<Ref> = None;
        for a in args {
            let index = a.unsigned_abs();
            let arg_fn = if graph.is_variable(index) {
                let order = self.index_to_order[&index];
                self.mk_var(order)
            } else {
                debug_assert!(graph.is_gate(index));
                if graph.gate(index).module() {
                    let order = self.module_pseudo_var(graph, index, memo, pseudo);
                    self.mk_var(order)
                } else {
                    self.convert_gate(graph, index, memo, pseudo)
                }
            };
            let arg_fn = if a < 0 { -arg_fn } else { arg_fn };
            acc = Some(match acc {
                None => arg_fn,
                Some(f) => self.apply(op, f, arg_fn),
            });
        }
        let f = acc.expect("at least one argument");
        memo.insert(gate, f);
        f
    }

    /// Registers a module gate as a pseudo-variable and returns its
    /// ordering position.
    fn module_pseudo_var(
        &mut self,
        graph: &Graph,
        gate: u32,
        memo: &mut HashMap<u32, Ref>,
        pseudo: &mut HashMap<u32, u32>,
    ) -> u32 {
        if let Some(&order) = pseudo.get(&gate) {
            return order;
        }
        let root = self.convert_gate(graph, gate, memo, pseudo);
        let order = self.num_vars + 1 + self.modules.len() as u32;
        debug!("module G{} becomes pseudo-variable at order {}", gate, order);
        self.modules.push((order, root));
        self.module_orders.insert(order, root);
        pseudo.insert(gate, order);
        order
    }

    /// Asserts the canonical-form invariants over the graph rooted at
    /// `root`. Violations are bugs.
    pub fn test_structure(&self, root: Ref) {
        let mut visited: std::collections::HashSet<u32> = std::collections::HashSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_terminal(node) || !visited.insert(node.index()) {
                continue;
            }
            let i = node.index();
            let high = self.high(i);
            let low = self.low(i);
            assert!(!high.is_negated(), "complemented high edge at @{}", i);
            assert_ne!(low, high, "redundant vertex at @{}", i);
            for child in [high, low] {
                if !self.is_terminal(child) {
                    assert!(
                        self.order(child.index()) > self.order(i),
                        "variable order is not increasing at @{}",
                        i
                    );
                }
                stack.push(child);
            }
        }
        for (_, module_root) in &self.modules {
            self.test_structure(*module_root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_terminals() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        assert_eq!(bdd.apply_and(bdd.one, x), x);
        assert_eq!(bdd.apply_and(x, bdd.one), x);
        assert_eq!(bdd.apply_and(bdd.zero, x), bdd.zero);
        assert_eq!(bdd.apply_and(x, x), x);
        assert_eq!(bdd.apply_and(x, -x), bdd.zero);
    }

    #[test]
    fn test_apply_or_terminals() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        assert_eq!(bdd.apply_or(bdd.zero, x), x);
        assert_eq!(bdd.apply_or(x, bdd.one), bdd.one);
        assert_eq!(bdd.apply_or(x, x), x);
        assert_eq!(bdd.apply_or(x, -x), bdd.one);
    }

    #[test]
    fn test_mk_node_canonicity() {
        let mut bdd = Bdd::default();
        let x2 = bdd.mk_var(2);
        // A negated high edge flips into an outer complement.
        let f = bdd.mk_node(1, bdd.one, -x2);
        assert!(f.is_negated());
        assert!(!bdd.high(f.index()).is_negated());
        // Equal cofactors collapse.
        assert_eq!(bdd.mk_node(1, x2, x2), x2);
        // Structural sharing.
        let g = bdd.mk_node(1, bdd.zero, x2);
        let h = bdd.mk_node(1, bdd.zero, x2);
        assert_eq!(g, h);
    }

    #[test]
    fn test_de_morgan() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let lhs = bdd.apply_and(x, y);
        let rhs = bdd.apply_or(-x, -y);
        assert_eq!(-lhs, rhs);
    }

    #[test]
    fn test_evaluate() {
        let mut bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let and_xy = bdd.apply_and(x, y);
        let f = bdd.apply_or(and_xy, -y);
        let mut a = HashMap::new();
        a.insert(1, false);
        a.insert(2, true);
        assert!(!bdd.evaluate(f, &a));
        a.insert(2, false);
        assert!(bdd.evaluate(f, &a));
        bdd.test_structure(f);
    }

    #[test]
    fn test_structure_over_random_formula() {
        let mut bdd = Bdd::default();
        let vars: Vec<Ref> = (1..=6).map(|v| bdd.mk_var(v)).collect();
        let mut f = bdd.zero;
        // Chain of alternating operations with mixed polarities.
        for (i, &v) in vars.iter().enumerate() {
            f = if i % 2 == 0 {
                bdd.apply_or(f, v)
            } else {
                let g = bdd.apply_and(f, -v);
                bdd.apply_or(g, vars[i - 1])
            };
        }
        bdd.test_structure(f);
    }
}
