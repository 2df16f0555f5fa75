//! Structural rewrite passes over the Boolean graph.
//!
//! The pipeline reduces an arbitrary fault-tree graph to a normalized
//! form the BDD engine consumes: only AND/OR gates, negations pushed down
//! to variable literals, constants folded away, modules marked, and a
//! total variable ordering assigned. Every pass preserves Boolean
//! equivalence with respect to the top event and terminates; passes do no
//! I/O and report nothing; violations of pass postconditions are bugs.

use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::graph::{GateType, Graph, State};

/// Runs the full pipeline in its fixed order.
pub fn run(graph: &mut Graph) {
    debug!("preprocessing: constant propagation");
    propagate_constants(graph);
    debug!("preprocessing: normalization");
    normalize(graph);
    debug!("preprocessing: complement propagation");
    propagate_complements(graph);
    debug!("preprocessing: coalescing");
    coalesce(graph);
    // Coalescing can fold complementary literals into a constant gate.
    propagate_constants(graph);
    debug!("preprocessing: module detection");
    detect_modules(graph);
    debug!("preprocessing: variable ordering");
    order_variables(graph);
}

/// Gates reachable from the root, children before parents.
fn gate_post_order(graph: &Graph) -> Vec<u32> {
    let root = graph.root().unsigned_abs();
    if !graph.is_gate(root) {
        return Vec::new();
    }
    let mut order = Vec::new();
    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(root);
    let mut stack: Vec<(u32, usize)> = vec![(root, 0)];
    loop {
        let (gate, pos) = match stack.last() {
            Some(&top) => top,
            None => break,
        };
        let args = graph.gate(gate).args();
        if pos < args.len() {
            stack.last_mut().expect("non-empty stack").1 += 1;
            let child = args[pos].unsigned_abs();
            if graph.is_gate(child) && visited.insert(child) {
                stack.push((child, 0));
            }
        } else {
            order.push(gate);
            stack.pop();
        }
    }
    order
}

/// Pass 1: folds house-event constants and collapsed sub-gates.
fn propagate_constants(graph: &mut Graph) {
    for gate in gate_post_order(graph) {
        while graph.gate(gate).state() == State::Normal {
            let mut found = None;
            for &a in graph.gate(gate).args() {
                let i = a.unsigned_abs();
                if graph.is_constant(i) {
                    found = Some((i, graph.constant_value(i)));
                    break;
                }
                if graph.is_gate(i) && graph.gate(i).state() != State::Normal {
                    found = Some((i, graph.gate(i).state() == State::Unity));
                    break;
                }
            }
            match found {
                Some((node, value)) => graph.process_constant_arg(gate, node, value),
                None => break,
            }
        }
    }
}

/// Pass 2: rewrites XOR, ATLEAST, NAND, and NOR into AND/OR/NOT
/// compositions, then inlines pass-through gates.
fn normalize(graph: &mut Graph) {
    // Parents flip their edges to negation-flavored children; the
    // children then retype in place (NAND -> AND, NOR -> OR, NOT -> NULL).
    let gates = gate_post_order(graph);
    for &g in &gates {
        let args: Vec<i32> = graph.gate(g).args().to_vec();
        for a in args {
            let i = a.unsigned_abs();
            if graph.is_gate(i)
                && matches!(graph.gate(i).gate_type(), GateType::Not | GateType::Nand | GateType::Nor)
            {
                graph.negate_arg(g, a);
            }
        }
    }
    let root = graph.root();
    let root_index = root.unsigned_abs();
    if graph.is_gate(root_index)
        && matches!(
            graph.gate(root_index).gate_type(),
            GateType::Not | GateType::Nand | GateType::Nor
        )
    {
        graph.set_root(-root);
    }
    for &g in &gates {
        let retyped = match graph.gate(g).gate_type() {
            GateType::Not => Some(GateType::Null),
            GateType::Nand => Some(GateType::And),
            GateType::Nor => Some(GateType::Or),
            _ => None,
        };
        if let Some(t) = retyped {
            graph.retype(g, t);
        }
    }

    // Expand XOR and ATLEAST into AND/OR compositions.
    let mut queue: Vec<u32> = gates
        .iter()
        .copied()
        .filter(|&g| matches!(graph.gate(g).gate_type(), GateType::Xor | GateType::Atleast))
        .collect();
    while let Some(g) = queue.pop() {
        if graph.gate(g).state() != State::Normal {
            continue;
        }
        match graph.gate(g).gate_type() {
            GateType::Xor => normalize_xor(graph, g),
            GateType::Atleast => normalize_atleast(graph, g, &mut queue),
            _ => {}
        }
    }

    eliminate_null_gates(graph);
}

/// `a ⊕ b = (a ∧ ¬b) ∨ (¬a ∧ b)`
fn normalize_xor(graph: &mut Graph, gate: u32) {
    let args = graph.gate(gate).args().to_vec();
    assert_eq!(args.len(), 2, "XOR gate must be binary");
    let (a, b) = (args[0], args[1]);
    graph.erase_arg(gate, a);
    graph.erase_arg(gate, b);
    graph.retype(gate, GateType::Or);
    let left = graph.new_gate(GateType::And);
    graph.add_arg(left, a).expect("fresh AND gate");
    graph.add_arg(left, -b).expect("fresh AND gate");
    let right = graph.new_gate(GateType::And);
    graph.add_arg(right, -a).expect("fresh AND gate");
    graph.add_arg(right, b).expect("fresh AND gate");
    graph.add_arg(gate, left as i32).expect("fresh OR gate");
    graph.add_arg(gate, right as i32).expect("fresh OR gate");
}

/// `@(k, [x, y…]) = (x ∧ @(k-1, [y…])) ∨ @(k, [y…])`
///
/// The two clones share the `y` argument set. Freshly created ATLEAST
/// clones queue up for further expansion.
fn normalize_atleast(graph: &mut Graph, gate: u32, queue: &mut Vec<u32>) {
    // Degenerate thresholds retype (or collapse) without expansion.
    graph.reduce_atleast_gate(gate);
    if graph.gate(gate).state() != State::Normal || graph.gate(gate).gate_type() != GateType::Atleast {
        return;
    }
    let args = graph.gate(gate).args().to_vec();
    let k = graph.gate(gate).vote_number();
    assert!(k >= 2 && k < args.len());
    let x = args[0];
    let rest = &args[1..];

    for &a in &args {
        graph.erase_arg(gate, a);
    }
    graph.retype(gate, GateType::Or);

    let with_x = graph.new_gate(GateType::And);
    graph.add_arg(with_x, x).expect("fresh AND gate");
    let sub_one = graph.materialize_atleast(k - 1, rest).expect("clone arguments are distinct");
    graph.add_arg(with_x, sub_one).expect("fresh AND gate");
    let sub_two = graph.materialize_atleast(k, rest).expect("clone arguments are distinct");
    graph.add_arg(gate, with_x as i32).expect("fresh OR gate");
    graph.add_arg(gate, sub_two).expect("fresh OR gate");

    for sub in [sub_one, sub_two] {
        let i = sub.unsigned_abs();
        if graph.is_gate(i) && graph.gate(i).gate_type() == GateType::Atleast {
            queue.push(i);
        }
    }
}

/// Inlines NULL pass-through gates into their parents.
fn eliminate_null_gates(graph: &mut Graph) {
    // The root may sit on a chain of pass-throughs.
    loop {
        let root = graph.root();
        let i = root.unsigned_abs();
        if graph.is_gate(i)
            && graph.gate(i).gate_type() == GateType::Null
            && graph.gate(i).state() == State::Normal
        {
            let inner = graph.gate(i).args()[0];
            graph.set_root(if root < 0 { -inner } else { inner });
        } else {
            break;
        }
    }
    for g in gate_post_order(graph) {
        if graph.gate(g).state() != State::Normal {
            continue;
        }
        loop {
            let mut subst = None;
            for &a in graph.gate(g).args() {
                let i = a.unsigned_abs();
                if graph.is_gate(i)
                    && graph.gate(i).gate_type() == GateType::Null
                    && graph.gate(i).state() == State::Normal
                {
                    let inner = graph.gate(i).args()[0];
                    subst = Some((a, if a < 0 { -inner } else { inner }));
                    break;
                }
            }
            let Some((old, new)) = subst else { break };
            graph.erase_arg(g, old);
            let _ = graph.add_arg(g, new); // May fold; arity cannot grow.
            if graph.gate(g).state() != State::Normal {
                break;
            }
        }
    }
}

/// Pass 3: pushes negations down to variable literals (De Morgan),
/// removing complemented gate edges.
fn propagate_complements(graph: &mut Graph) {
    let mut complements: HashMap<u32, u32> = HashMap::new();

    let root = graph.root();
    if root < 0
        && graph.is_gate(root.unsigned_abs())
        && graph.gate(root.unsigned_abs()).state() == State::Normal
    {
        let c = complement_gate(graph, root.unsigned_abs(), &mut complements);
        graph.set_root(c as i32);
    }

    let start = graph.root().unsigned_abs();
    if !graph.is_gate(start) {
        return;
    }
    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(start);
    let mut stack = vec![start];
    while let Some(g) = stack.pop() {
        if graph.gate(g).state() != State::Normal {
            continue;
        }
        let args: Vec<i32> = graph.gate(g).args().to_vec();
        for a in args {
            let i = a.unsigned_abs();
            if !graph.is_gate(i) {
                continue;
            }
            if graph.gate(i).state() != State::Normal {
                continue; // Folded by the next constant propagation.
            }
            let child = if a < 0 {
                let c = complement_gate(graph, i, &mut complements);
                graph.erase_arg(g, a);
                if graph.add_arg(g, c as i32).is_err() {
                    unreachable!("complement splice cannot violate arity");
                }
                if graph.gate(g).state() != State::Normal {
                    break;
                }
                c
            } else {
                i
            };
            if visited.insert(child) {
                stack.push(child);
            }
        }
    }
}

/// De Morgan dual of a gate: the opposite connective over negated args.
fn complement_gate(graph: &mut Graph, gate: u32, complements: &mut HashMap<u32, u32>) -> u32 {
    if let Some(&c) = complements.get(&gate) {
        return c;
    }
    let dual = match graph.gate(gate).gate_type() {
        GateType::And => GateType::Or,
        GateType::Or => GateType::And,
        other => unreachable!("complement of {:?} after normalization", other),
    };
    let args: Vec<i32> = graph.gate(gate).args().iter().map(|&a| -a).collect();
    let c = graph.new_gate(dual);
    for a in args {
        graph.add_arg(c, a).expect("negated copies of distinct arguments");
    }
    debug!("complement of G{} is G{}", gate, c);
    complements.insert(gate, c);
    complements.insert(c, gate);
    c
}

/// Pass 4: merges same-connective single-parent children into parents.
fn coalesce(graph: &mut Graph) {
    let mut parents: HashMap<u32, usize> = HashMap::new();
    for g in gate_post_order(graph) {
        for &a in graph.gate(g).args() {
            let i = a.unsigned_abs();
            if graph.is_gate(i) {
                *parents.entry(i).or_insert(0) += 1;
            }
        }
    }
    for g in gate_post_order(graph) {
        if graph.gate(g).state() != State::Normal {
            continue;
        }
        let t = graph.gate(g).gate_type();
        if !matches!(t, GateType::And | GateType::Or) {
            continue;
        }
        loop {
            let mut target = None;
            for &a in graph.gate(g).args() {
                if a < 0 {
                    continue; // Negative edges are gone, but be safe.
                }
                let c = a.unsigned_abs();
                if graph.is_gate(c)
                    && graph.gate(c).gate_type() == t
                    && graph.gate(c).state() == State::Normal
                    && parents.get(&c) == Some(&1)
                {
                    target = Some(c);
                    break;
                }
            }
            let Some(c) = target else { break };
            debug!("coalescing G{} into G{}", c, g);
            let child_args: Vec<i32> = graph.gate(c).args().to_vec();
            graph.erase_arg(g, c as i32);
            for a in child_args {
                if graph.gate(g).state() != State::Normal {
                    break;
                }
                graph.add_arg(g, a).expect("AND/OR accepts any arity");
            }
            if graph.gate(g).state() != State::Normal {
                break;
            }
        }
    }
}

/// Pass 5: marks modules, the sub-DAGs whose nodes are visited only within
/// the owning gate's DFS window (one-pass enter/exit-time detection).
fn detect_modules(graph: &mut Graph) {
    let root = graph.root().unsigned_abs();
    if !graph.is_gate(root) {
        return;
    }

    #[derive(Default)]
    struct Times {
        enter: HashMap<u32, usize>,
        exit: HashMap<u32, usize>,
        first: HashMap<u32, usize>,
        last: HashMap<u32, usize>,
        clock: usize,
    }

    fn visit_leaf(times: &mut Times, node: u32) {
        times.clock += 1;
        times.first.entry(node).or_insert(times.clock);
        times.last.insert(node, times.clock);
    }

    fn dfs(graph: &Graph, gate: u32, times: &mut Times) {
        times.clock += 1;
        times.enter.insert(gate, times.clock);
        times.first.entry(gate).or_insert(times.clock);
        times.last.insert(gate, times.clock);
        let args: Vec<i32> = graph.gate(gate).args().to_vec();
        for a in args {
            let i = a.unsigned_abs();
            if graph.is_gate(i) {
                if times.enter.contains_key(&i) {
                    visit_leaf(times, i); // Re-visit of a shared gate.
                } else {
                    dfs(graph, i, times);
                }
            } else {
                visit_leaf(times, i);
            }
        }
        times.clock += 1;
        times.exit.insert(gate, times.clock);
        times.last.insert(gate, times.clock);
    }

    let mut times = Times::default();
    dfs(graph, root, &mut times);

    // (min first, max last) over each gate's descendants.
    fn min_max(
        graph: &Graph,
        gate: u32,
        times: &Times,
        memo: &mut HashMap<u32, (usize, usize)>,
    ) -> (usize, usize) {
        if let Some(&cached) = memo.get(&gate) {
            return cached;
        }
        let mut lo = usize::MAX;
        let mut hi = 0;
        for &a in graph.gate(gate).args() {
            let i = a.unsigned_abs();
            lo = lo.min(times.first[&i]);
            hi = hi.max(times.last[&i]);
            if graph.is_gate(i) {
                let (clo, chi) = min_max(graph, i, times, memo);
                lo = lo.min(clo);
                hi = hi.max(chi);
            }
        }
        memo.insert(gate, (lo, hi));
        (lo, hi)
    }

    let mut memo = HashMap::new();
    for g in gate_post_order(graph) {
        let (lo, hi) = min_max(graph, g, &times, &mut memo);
        if g == root || (lo > times.enter[&g] && hi < times.exit[&g]) {
            debug!("G{} is a module", g);
            graph.mark_module(g);
        }
    }
}

/// Pass 6: assigns the immutable variable ordering.
///
/// Depth-first discovery order, stably reordered by occurrence count
/// (most frequent first).
fn order_variables(graph: &mut Graph) {
    let mut occurrences: HashMap<u32, usize> = HashMap::new();
    let mut discovery: Vec<u32> = Vec::new();

    let root = graph.root().unsigned_abs();
    if graph.is_variable(root) {
        let mut order = HashMap::new();
        order.insert(root, 1);
        graph.set_var_order(order);
        return;
    }
    if !graph.is_gate(root) {
        graph.set_var_order(HashMap::new());
        return;
    }

    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(root);
    let mut stack = vec![root];
    while let Some(g) = stack.pop() {
        for &a in graph.gate(g).args() {
            let i = a.unsigned_abs();
            if graph.is_gate(i) {
                if visited.insert(i) {
                    stack.push(i);
                }
            } else if graph.is_variable(i) {
                let count = occurrences.entry(i).or_insert(0);
                if *count == 0 {
                    discovery.push(i);
                }
                *count += 1;
            }
        }
    }

    let mut vars = discovery;
    vars.sort_by_key(|v| std::cmp::Reverse(occurrences[v]));
    let order: HashMap<u32, u32> = vars.into_iter().zip(1u32..).collect();
    graph.set_var_order(order);
}
