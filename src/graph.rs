//! Indexed Boolean graph of the fault tree.
//!
//! The graph is a mutable DAG of indexed gates, variables, and constants
//! suitable for symbolic rewriting. Nodes share one dense index space per
//! graph; arguments are signed indices, the sign being the polarity of
//! the edge. Index values 0 and 1 are never allocated (1 is reserved for
//! the decision diagram terminal downstream).
//!
//! The argument-addition contract of [`Graph::add_arg`] is the heart of
//! normalization: duplicate and complementary arguments fold into
//! equivalent simpler structures at insertion time, so rewrite passes can
//! splice arguments around without re-checking Boolean identities.

use std::collections::BTreeSet;
use std::fmt;

use hashbrown::HashMap;
use log::debug;

use crate::error::Error;
use crate::model::{Arg, Connective, Formula, Model};

/// Connective of an indexed gate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GateType {
    And,
    Or,
    Not,
    /// Single-argument pass-through.
    Null,
    Nand,
    Nor,
    Xor,
    Atleast,
}

/// Constant state of a gate.
///
/// `Null` means constantly false, `Unity` constantly true. A gate
/// collapses to one of these when its arguments force a constant value;
/// its argument list is cleared at that point.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Normal,
    Null,
    Unity,
}

/// An indexed gate: a connective over ordered, signed arguments.
#[derive(Debug, Clone)]
pub struct Gate {
    gate_type: GateType,
    /// K threshold; meaningful for `Atleast` gates.
    vote_number: usize,
    state: State,
    args: Vec<i32>,
    variable_args: BTreeSet<i32>,
    gate_args: BTreeSet<i32>,
    constant_args: BTreeSet<i32>,
    module: bool,
}

impl Gate {
    fn new(gate_type: GateType) -> Self {
        Self {
            gate_type,
            vote_number: 0,
            state: State::Normal,
            args: Vec::new(),
            variable_args: BTreeSet::new(),
            gate_args: BTreeSet::new(),
            constant_args: BTreeSet::new(),
            module: false,
        }
    }

    pub fn gate_type(&self) -> GateType {
        self.gate_type
    }
    pub fn vote_number(&self) -> usize {
        self.vote_number
    }
    pub fn state(&self) -> State {
        self.state
    }
    /// Ordered signed arguments.
    pub fn args(&self) -> &[i32] {
        &self.args
    }
    pub fn variable_args(&self) -> &BTreeSet<i32> {
        &self.variable_args
    }
    pub fn gate_args(&self) -> &BTreeSet<i32> {
        &self.gate_args
    }
    pub fn constant_args(&self) -> &BTreeSet<i32> {
        &self.constant_args
    }
    /// Whether the sub-DAG under this gate shares no variables with the
    /// rest of the graph.
    pub fn module(&self) -> bool {
        self.module
    }
}

#[derive(Debug, Clone)]
struct Variable {
    event: String,
    p: f64,
}

/// The indexed Boolean graph.
pub struct Graph {
    next_index: u32,
    /// Signed reference to the top node (gate, variable, or constant).
    root: i32,
    gates: HashMap<u32, Gate>,
    variables: HashMap<u32, Variable>,
    constants: HashMap<u32, bool>,
    event_to_var: HashMap<String, u32>,
    /// Variable index -> position in the BDD ordering; assigned once by
    /// preprocessing and immutable afterwards.
    var_order: HashMap<u32, u32>,
}

impl Graph {
    pub(crate) fn empty() -> Self {
        Self {
            next_index: 2, // 0 is unused, |1| is reserved for terminals.
            root: 0,
            gates: HashMap::new(),
            variables: HashMap::new(),
            constants: HashMap::new(),
            event_to_var: HashMap::new(),
            var_order: HashMap::new(),
        }
    }

    /// Builds the indexed graph of a validated model.
    pub fn from_model(model: &Model) -> Result<Self, Error> {
        let mut graph = Graph::empty();
        let mut gate_memo = HashMap::new();
        let mut house_memo = HashMap::new();
        let mut in_progress = Vec::new();
        let top = model
            .gate(model.top_event())
            .ok_or_else(|| Error::InvalidModel(format!("top gate '{}' is not defined", model.top_event())))?;
        let root = graph.define_formula(model, top, &mut gate_memo, &mut house_memo, &mut in_progress)?;
        graph.root = root as i32;
        Ok(graph)
    }

    fn define_formula(
        &mut self,
        model: &Model,
        formula: &Formula,
        gate_memo: &mut HashMap<String, u32>,
        house_memo: &mut HashMap<String, u32>,
        in_progress: &mut Vec<String>,
    ) -> Result<u32, Error> {
        let gate_type = match formula.connective() {
            Connective::And => GateType::And,
            Connective::Or => GateType::Or,
            Connective::Not => GateType::Not,
            Connective::Null => GateType::Null,
            Connective::Nand => GateType::Nand,
            Connective::Nor => GateType::Nor,
            Connective::Xor => GateType::Xor,
            Connective::Atleast => GateType::Atleast,
        };
        let index = self.new_gate(gate_type);
        if let Some(k) = formula.vote_number() {
            self.gates.get_mut(&index).expect("fresh gate").vote_number = k;
        }
        for arg in formula.args() {
            let signed = match arg {
                Arg::Basic { id, complement } => {
                    let event = model
                        .basic_events()
                        .get(id)
                        .ok_or_else(|| Error::InvalidModel(format!("undefined basic event '{}'", id)))?;
                    let v = self.variable_for(id, event.p());
                    apply_sign(v, *complement)
                }
                Arg::House { id, complement } => {
                    let event = model
                        .house_events()
                        .get(id)
                        .ok_or_else(|| Error::InvalidModel(format!("undefined house event '{}'", id)))?;
                    let c = *house_memo
                        .entry(id.clone())
                        .or_insert_with(|| self.new_constant(event.state()));
                    apply_sign(c, *complement)
                }
                Arg::Gate { id, complement } => {
                    let sub = if let Some(&sub) = gate_memo.get(id) {
                        sub
                    } else {
                        if in_progress.iter().any(|g| g == id) {
                            return Err(Error::InvalidModel(format!("cycle through gate '{}'", id)));
                        }
                        let sub_formula = model
                            .gate(id)
                            .ok_or_else(|| Error::InvalidModel(format!("undefined gate '{}'", id)))?;
                        in_progress.push(id.clone());
                        let sub = self.define_formula(model, sub_formula, gate_memo, house_memo, in_progress)?;
                        in_progress.pop();
                        gate_memo.insert(id.clone(), sub);
                        sub
                    };
                    apply_sign(sub, *complement)
                }
                Arg::Formula { formula, complement } => {
                    let sub = self.define_formula(model, formula, gate_memo, house_memo, in_progress)?;
                    apply_sign(sub, *complement)
                }
            };
            if self.gates[&index].state != State::Normal {
                break; // The gate became constant; its value absorbs the rest.
            }
            // Collapsed sub-gates stay as gate args here; the constant
            // propagation pass folds them.
            self.add_arg(index, signed)?;
        }
        Ok(index)
    }

}

fn apply_sign(index: u32, complement: bool) -> i32 {
    let i = index as i32;
    if complement {
        -i
    } else {
        i
    }
}

// Node allocation and lookup.
impl Graph {
    fn alloc_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    pub(crate) fn new_gate(&mut self, gate_type: GateType) -> u32 {
        let index = self.alloc_index();
        self.gates.insert(index, Gate::new(gate_type));
        debug!("new gate G{} of type {:?}", index, gate_type);
        index
    }

    pub(crate) fn new_variable(&mut self, event: &str, p: f64) -> u32 {
        let index = self.alloc_index();
        self.variables.insert(
            index,
            Variable {
                event: event.to_string(),
                p,
            },
        );
        self.event_to_var.insert(event.to_string(), index);
        index
    }

    fn variable_for(&mut self, event: &str, p: f64) -> u32 {
        if let Some(&v) = self.event_to_var.get(event) {
            return v;
        }
        self.new_variable(event, p)
    }

    pub(crate) fn new_constant(&mut self, value: bool) -> u32 {
        let index = self.alloc_index();
        self.constants.insert(index, value);
        index
    }

    pub fn root(&self) -> i32 {
        self.root
    }
    pub(crate) fn set_root(&mut self, root: i32) {
        self.root = root;
    }

    pub fn gate(&self, index: u32) -> &Gate {
        &self.gates[&index]
    }
    pub(crate) fn gate_mut(&mut self, index: u32) -> &mut Gate {
        self.gates.get_mut(&index).expect("unknown gate index")
    }

    pub fn is_gate(&self, index: u32) -> bool {
        self.gates.contains_key(&index)
    }
    pub fn is_variable(&self, index: u32) -> bool {
        self.variables.contains_key(&index)
    }
    pub fn is_constant(&self, index: u32) -> bool {
        self.constants.contains_key(&index)
    }

    pub fn constant_value(&self, index: u32) -> bool {
        self.constants[&index]
    }

    pub fn variable_event(&self, index: u32) -> &str {
        &self.variables[&index].event
    }
    pub fn variable_p(&self, index: u32) -> f64 {
        self.variables[&index].p
    }
    pub fn variable_of_event(&self, event: &str) -> Option<u32> {
        self.event_to_var.get(event).copied()
    }
    pub fn variable_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.variables.keys().copied()
    }
    pub fn gate_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.gates.keys().copied()
    }

    pub fn var_order(&self) -> &HashMap<u32, u32> {
        &self.var_order
    }
    pub(crate) fn set_var_order(&mut self, order: HashMap<u32, u32>) {
        assert!(self.var_order.is_empty(), "Variable ordering is assigned once");
        self.var_order = order;
    }

    pub(crate) fn mark_module(&mut self, index: u32) {
        self.gate_mut(index).module = true;
    }
}

// The argument-addition contract.
impl Graph {
    /// Adds a signed argument to a gate.
    ///
    /// Duplicate and complementary arguments fold per the connective:
    /// duplicates are idempotent for AND/OR/NAND/NOR, nullify XOR, and
    /// rewrite ATLEAST through
    /// `@(k, [x, x, y…]) = x·@(k-2, [y…]) | @(k, [y…])`;
    /// complements collapse the gate to its absorbing constant, or for
    /// ATLEAST drop both literals and decrement the threshold.
    ///
    /// # Errors
    ///
    /// `InvalidGraph` when the connective's arity is violated (NOT/NULL
    /// with more than one argument).
    pub fn add_arg(&mut self, gate: u32, arg: i32) -> Result<(), Error> {
        debug_assert_ne!(arg, 0);
        debug!("add_arg(G{}, {})", gate, arg);
        let g = &self.gates[&gate];
        assert_eq!(g.state, State::Normal, "Adding arguments to a constant gate");

        if matches!(g.gate_type, GateType::Not | GateType::Null) && !g.args.is_empty() {
            return Err(Error::InvalidGraph(format!(
                "{:?} gate G{} takes a single argument",
                g.gate_type, gate
            )));
        }

        if g.args.contains(&arg) {
            return self.process_duplicate_arg(gate, arg);
        }
        if g.args.contains(&-arg) {
            self.process_complement_arg(gate, arg);
            return Ok(());
        }

        self.push_arg(gate, arg);
        Ok(())
    }

    /// Appends without folding; callers guarantee the argument is new.
    fn push_arg(&mut self, gate: u32, arg: i32) {
        let index = arg.unsigned_abs();
        let kind = if self.is_variable(index) {
            0
        } else if self.is_gate(index) {
            1
        } else {
            debug_assert!(self.is_constant(index), "Unknown node index {}", index);
            2
        };
        let g = self.gate_mut(gate);
        g.args.push(arg);
        match kind {
            0 => g.variable_args.insert(arg),
            1 => g.gate_args.insert(arg),
            _ => g.constant_args.insert(arg),
        };
    }

    pub(crate) fn erase_arg(&mut self, gate: u32, arg: i32) {
        let g = self.gate_mut(gate);
        let pos = g.args.iter().position(|&a| a == arg).expect("argument to erase");
        g.args.remove(pos);
        g.variable_args.remove(&arg);
        g.gate_args.remove(&arg);
        g.constant_args.remove(&arg);
    }

    /// The gate is constantly false; arguments are dropped.
    pub(crate) fn nullify(&mut self, gate: u32) {
        debug!("G{} collapses to Null", gate);
        let g = self.gate_mut(gate);
        g.state = State::Null;
        g.args.clear();
        g.variable_args.clear();
        g.gate_args.clear();
        g.constant_args.clear();
    }

    /// The gate is constantly true; arguments are dropped.
    pub(crate) fn make_unity(&mut self, gate: u32) {
        debug!("G{} collapses to Unity", gate);
        let g = self.gate_mut(gate);
        g.state = State::Unity;
        g.args.clear();
        g.variable_args.clear();
        g.gate_args.clear();
        g.constant_args.clear();
    }

    fn process_duplicate_arg(&mut self, gate: u32, arg: i32) -> Result<(), Error> {
        let g = &self.gates[&gate];
        debug!("duplicate argument {} for G{} ({:?})", arg, gate, g.gate_type);
        match g.gate_type {
            GateType::And | GateType::Or => {
                if g.args.len() == 1 {
                    // x ∧ x = x ∨ x = x
                    self.gate_mut(gate).gate_type = GateType::Null;
                }
            }
            GateType::Nand | GateType::Nor => {
                if g.args.len() == 1 {
                    self.gate_mut(gate).gate_type = GateType::Not;
                }
            }
            GateType::Xor => self.nullify(gate), // x ⊕ x = 0
            GateType::Atleast => {
                // @(1, …) is an OR; its duplicates are idempotent.
                if g.vote_number > 1 {
                    self.process_atleast_duplicate(gate, arg)?;
                }
            }
            GateType::Not | GateType::Null => unreachable!("arity checked by add_arg"),
        }
        Ok(())
    }

    /// `@(k, [x, x, y…]) = x·@(k-2, [y…]) | @(k, [y…])`
    ///
    /// The duplicate contributes two votes when x holds. Sub-gates with
    /// degenerate thresholds retype immediately.
    fn process_atleast_duplicate(&mut self, gate: u32, x: i32) -> Result<(), Error> {
        let g = &self.gates[&gate];
        let k = g.vote_number;
        assert!(k >= 2, "ATLEAST gate with k < 2 must have been retyped");
        let rest: Vec<i32> = g.args.iter().copied().filter(|&a| a != x).collect();

        let g = self.gate_mut(gate);
        g.args.clear();
        g.variable_args.clear();
        g.gate_args.clear();
        g.constant_args.clear();
        g.vote_number = 0;

        if rest.len() >= k {
            // Both terms are non-trivial.
            self.gate_mut(gate).gate_type = GateType::Or;
            if k == 2 {
                self.add_arg(gate, x)?; // x·@(0, [y…]) = x
            } else {
                let sub = self.materialize_atleast(k - 2, &rest)?;
                let and_gate = self.new_gate(GateType::And);
                self.add_arg(and_gate, x)?;
                self.add_arg(and_gate, sub)?;
                self.add_arg(gate, and_gate as i32)?;
            }
            let sub = self.materialize_atleast(k, &rest)?;
            self.add_arg(gate, sub)?;
        } else {
            // @(k, [y…]) is impossible: only the x-term remains.
            if k == 2 {
                self.gate_mut(gate).gate_type = GateType::Null;
                self.add_arg(gate, x)?;
            } else {
                self.gate_mut(gate).gate_type = GateType::And;
                self.add_arg(gate, x)?;
                let sub = self.materialize_atleast(k - 2, &rest)?;
                self.add_arg(gate, sub)?;
            }
        }
        Ok(())
    }

    /// Materializes `@(k, args)` as a new node, retyping degenerate
    /// thresholds; returns a signed reference to the result.
    pub(crate) fn materialize_atleast(&mut self, k: usize, args: &[i32]) -> Result<i32, Error> {
        assert!(k >= 1 && k <= args.len());
        if args.len() == 1 {
            return Ok(args[0]); // @(1, [y]) = y
        }
        let gate_type = if k == 1 {
            GateType::Or
        } else if k == args.len() {
            GateType::And
        } else {
            GateType::Atleast
        };
        let sub = self.new_gate(gate_type);
        if gate_type == GateType::Atleast {
            self.gate_mut(sub).vote_number = k;
        }
        for &a in args {
            self.add_arg(sub, a)?;
        }
        Ok(sub as i32)
    }

    fn process_complement_arg(&mut self, gate: u32, arg: i32) {
        let g = &self.gates[&gate];
        debug!("complement argument {} for G{} ({:?})", arg, gate, g.gate_type);
        match g.gate_type {
            GateType::And | GateType::Nor => self.nullify(gate),
            GateType::Or | GateType::Nand | GateType::Xor => self.make_unity(gate),
            GateType::Atleast => {
                // Exactly one of x, ¬x always votes: @(k-1) over the rest.
                self.erase_arg(gate, -arg);
                let g = self.gate_mut(gate);
                g.vote_number -= 1;
                self.reduce_atleast(gate);
            }
            GateType::Not | GateType::Null => unreachable!("arity checked by add_arg"),
        }
    }

    /// Changes the connective in place; the caller owns the Boolean
    /// justification (e.g. parents have flipped their edges).
    pub(crate) fn retype(&mut self, gate: u32, gate_type: GateType) {
        self.gate_mut(gate).gate_type = gate_type;
    }

    /// Retypes an ATLEAST gate with a degenerate threshold; no-op for
    /// other connectives.
    pub(crate) fn reduce_atleast_gate(&mut self, gate: u32) {
        if self.gates[&gate].gate_type == GateType::Atleast {
            self.reduce_atleast(gate);
        }
    }

    /// Retypes an ATLEAST gate whose threshold or arity became
    /// degenerate after a mutation.
    fn reduce_atleast(&mut self, gate: u32) {
        let g = &self.gates[&gate];
        debug_assert_eq!(g.gate_type, GateType::Atleast);
        let k = g.vote_number;
        let n = g.args.len();
        if k == 0 {
            self.make_unity(gate);
        } else if n < k {
            self.nullify(gate);
        } else if n == 1 {
            self.gate_mut(gate).gate_type = GateType::Null;
        } else if k == 1 {
            self.gate_mut(gate).gate_type = GateType::Or;
        } else if k == n {
            self.gate_mut(gate).gate_type = GateType::And;
        }
    }

    /// Substitutes a constant truth value for an argument node.
    ///
    /// The node may be a house-event constant or a collapsed sub-gate;
    /// `value` is its truth value before the edge polarity is applied.
    pub(crate) fn process_constant_arg(&mut self, gate: u32, node: u32, value: bool) {
        let g = &self.gates[&gate];
        let arg = if g.args.contains(&(node as i32)) {
            node as i32
        } else {
            debug_assert!(g.args.contains(&-(node as i32)));
            -(node as i32)
        };
        let v = if arg < 0 { !value } else { value };
        debug!("constant argument {} = {} for G{} ({:?})", arg, v, gate, g.gate_type);

        self.erase_arg(gate, arg);
        let gate_type = self.gates[&gate].gate_type;
        match gate_type {
            GateType::Null => {
                if v {
                    self.make_unity(gate)
                } else {
                    self.nullify(gate)
                }
            }
            GateType::Not => {
                if v {
                    self.nullify(gate)
                } else {
                    self.make_unity(gate)
                }
            }
            GateType::Or => {
                if v {
                    self.make_unity(gate);
                } else {
                    match self.gates[&gate].args.len() {
                        0 => self.nullify(gate),
                        1 => self.gate_mut(gate).gate_type = GateType::Null,
                        _ => {}
                    }
                }
            }
            GateType::And => {
                if !v {
                    self.nullify(gate);
                } else {
                    match self.gates[&gate].args.len() {
                        0 => self.make_unity(gate),
                        1 => self.gate_mut(gate).gate_type = GateType::Null,
                        _ => {}
                    }
                }
            }
            GateType::Nor => {
                if v {
                    self.nullify(gate);
                } else {
                    match self.gates[&gate].args.len() {
                        0 => self.make_unity(gate),
                        1 => self.gate_mut(gate).gate_type = GateType::Not,
                        _ => {}
                    }
                }
            }
            GateType::Nand => {
                if !v {
                    self.make_unity(gate);
                } else {
                    match self.gates[&gate].args.len() {
                        0 => self.nullify(gate),
                        1 => self.gate_mut(gate).gate_type = GateType::Not,
                        _ => {}
                    }
                }
            }
            GateType::Xor => {
                // x ⊕ 1 = ¬x, x ⊕ 0 = x
                match self.gates[&gate].args.len() {
                    0 => {
                        if v {
                            self.make_unity(gate)
                        } else {
                            self.nullify(gate)
                        }
                    }
                    _ => {
                        self.gate_mut(gate).gate_type = if v { GateType::Not } else { GateType::Null };
                    }
                }
            }
            GateType::Atleast => {
                if v {
                    let g = self.gate_mut(gate);
                    g.vote_number -= 1;
                }
                self.reduce_atleast(gate);
            }
        }
    }

    /// Flips the polarity of every argument (De Morgan helper).
    pub(crate) fn negate_args(&mut self, gate: u32) {
        let g = self.gate_mut(gate);
        for a in &mut g.args {
            *a = -*a;
        }
        g.variable_args = std::mem::take(&mut g.variable_args).into_iter().map(|a| -a).collect();
        g.gate_args = std::mem::take(&mut g.gate_args).into_iter().map(|a| -a).collect();
        g.constant_args = std::mem::take(&mut g.constant_args).into_iter().map(|a| -a).collect();
    }

    /// Flips the polarity of one argument edge in place.
    pub(crate) fn negate_arg(&mut self, gate: u32, arg: i32) {
        let g = self.gate_mut(gate);
        let pos = g.args.iter().position(|&a| a == arg).expect("argument to negate");
        g.args[pos] = -arg;
        for set in [&mut g.variable_args, &mut g.gate_args, &mut g.constant_args] {
            if set.remove(&arg) {
                set.insert(-arg);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_arg_invariant(&self, gate: u32) {
        let g = &self.gates[&gate];
        assert_eq!(
            g.args.len(),
            g.variable_args.len() + g.gate_args.len() + g.constant_args.len(),
            "argument bookkeeping out of sync for G{}",
            gate
        );
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BooleanGraph(root = {})", self.root)?;
        let mut indices: Vec<u32> = self.gates.keys().copied().collect();
        indices.sort_unstable();
        for index in indices {
            let g = &self.gates[&index];
            writeln!(
                f,
                "  G{}: {:?}{} {:?} [{:?}]",
                index,
                g.gate_type,
                if g.gate_type == GateType::Atleast {
                    format!("({})", g.vote_number)
                } else {
                    String::new()
                },
                g.state,
                g.args,
            )?;
        }
        Ok(())
    }
}
