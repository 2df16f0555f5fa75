//! Zero-suppressed BDD for minimal cut set enumeration.
//!
//! A ZBDD vertex `(order, high, low)` encodes a family of sets: `high`
//! holds the sets containing the variable (with it removed), `low` the
//! sets without it. The zero-suppression rule (a vertex whose `high` is
//! the empty family is skipped) keeps sparse families compact. No
//! complement edges.
//!
//! [`Zbdd::from_bdd`] projects the satisfying assignments of a BDD
//! function to positive literals (cut-set semantics); [`Zbdd::minimize`]
//! then prunes non-minimal sets by subsumption, leaving an antichain
//! under set inclusion.

use hashbrown::HashMap;
use log::debug;

use crate::bdd::Bdd;
use crate::node::SetNode;
use crate::reference::Ref;
use crate::storage::Storage;

pub struct Zbdd {
    storage: Storage<SetNode>,
    union_cache: HashMap<(Ref, Ref), Ref>,
    subsume_cache: HashMap<(Ref, Ref), Ref>,
    minimize_cache: HashMap<Ref, Ref>,
    empty: Ref,
    base: Ref,
}

impl Zbdd {
    pub fn new(storage_bits: usize) -> Self {
        let mut storage = Storage::new(storage_bits);
        let empty = Ref::positive(storage.add(SetNode::terminal()) as u32);
        let base = Ref::positive(storage.add(SetNode::terminal()) as u32);
        assert_eq!(empty.index(), 1);
        assert_eq!(base.index(), 2);

        Self {
            storage,
            union_cache: HashMap::new(),
            subsume_cache: HashMap::new(),
            minimize_cache: HashMap::new(),
            empty,
            base,
        }
    }
}

impl Default for Zbdd {
    fn default() -> Self {
        Zbdd::new(16)
    }
}

impl Zbdd {
    /// The empty family ∅.
    pub fn empty(&self) -> Ref {
        self.empty
    }
    /// The family {∅} containing only the empty set.
    pub fn base(&self) -> Ref {
        self.base
    }

    pub fn is_empty(&self, node: Ref) -> bool {
        node == self.empty
    }
    pub fn is_base(&self, node: Ref) -> bool {
        node == self.base
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.is_empty(node) || self.is_base(node)
    }

    pub fn order(&self, index: u32) -> u32 {
        self.storage.value(index as usize).order
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.value(index as usize).high
    }

    pub fn mk_node(&mut self, order: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(order, 0, "Order must not be zero");
        assert!(!low.is_negated() && !high.is_negated());

        // Zero-suppression.
        if self.is_empty(high) {
            return low;
        }

        let i = self.storage.put(SetNode::new(order, high, low));
        Ref::positive(i as u32)
    }
}

impl Zbdd {
    /// Union of two families.
    pub fn union(&mut self, f: Ref, g: Ref) -> Ref {
        if self.is_empty(f) {
            return g;
        }
        if self.is_empty(g) || f == g {
            return f;
        }

        if self.is_base(f) {
            let index = g.index();
            let low = self.union(self.base, self.low(index));
            return self.mk_node(self.order(index), low, self.high(index));
        }
        if self.is_base(g) {
            return self.union(g, f);
        }

        let (f, g) = if f.as_lit() <= g.as_lit() { (f, g) } else { (g, f) };
        if let Some(&res) = self.union_cache.get(&(f, g)) {
            return res;
        }

        let i = self.order(f.index());
        let j = self.order(g.index());
        let res = if i < j {
            let low = self.union(self.low(f.index()), g);
            self.mk_node(i, low, self.high(f.index()))
        } else if i > j {
            let low = self.union(f, self.low(g.index()));
            self.mk_node(j, low, self.high(g.index()))
        } else {
            let low = self.union(self.low(f.index()), self.low(g.index()));
            let high = self.union(self.high(f.index()), self.high(g.index()));
            self.mk_node(i, low, high)
        };

        self.union_cache.insert((f, g), res);
        res
    }

    fn contains_empty_set(&self, f: Ref) -> bool {
        let mut node = f;
        while !self.is_terminal(node) {
            node = self.low(node.index());
        }
        self.is_base(node)
    }

    /// Removes from `f` every set that is a superset of some set in `g`.
    pub fn subsume(&mut self, f: Ref, g: Ref) -> Ref {
        if self.is_empty(g) || self.is_empty(f) {
            return f;
        }
        if self.is_base(g) || f == g {
            // Every set contains the empty set.
            return self.empty;
        }
        if self.is_base(f) {
            return if self.contains_empty_set(g) { self.empty } else { f };
        }

        if let Some(&res) = self.subsume_cache.get(&(f, g)) {
            return res;
        }

        let i = self.order(f.index());
        let j = self.order(g.index());
        let res = if j < i {
            // Sets of g containing its top variable cannot be subsets of
            // sets of f that lack it.
            self.subsume(f, self.low(g.index()))
        } else if i < j {
            let high = self.subsume(self.high(f.index()), g);
            let low = self.subsume(self.low(f.index()), g);
            self.mk_node(i, low, high)
        } else {
            let high = self.subsume(self.high(f.index()), self.high(g.index()));
            let high = self.subsume(high, self.low(g.index()));
            let low = self.subsume(self.low(f.index()), self.low(g.index()));
            self.mk_node(i, low, high)
        };

        self.subsume_cache.insert((f, g), res);
        res
    }

    /// Minimal sets of the family: `min(f) = min(l) ∪ v·(min(h) ÷ min(l))`.
    pub fn minimize(&mut self, f: Ref) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if let Some(&res) = self.minimize_cache.get(&f) {
            return res;
        }

        let v = self.order(f.index());
        let high = self.minimize(self.high(f.index()));
        let low = self.minimize(self.low(f.index()));
        let high = self.subsume(high, low);
        let res = self.mk_node(v, low, high);
        debug!("minimize({}) -> {}", f, res);

        self.minimize_cache.insert(f, res);
        res
    }

    /// Number of sets in the family.
    pub fn count(&self, f: Ref) -> u64 {
        fn walk(zbdd: &Zbdd, f: Ref, memo: &mut HashMap<Ref, u64>) -> u64 {
            if zbdd.is_empty(f) {
                return 0;
            }
            if zbdd.is_base(f) {
                return 1;
            }
            if let Some(&res) = memo.get(&f) {
                return res;
            }
            let index = f.index();
            let res = walk(zbdd, zbdd.low(index), memo) + walk(zbdd, zbdd.high(index), memo);
            memo.insert(f, res);
            res
        }
        walk(self, f, &mut HashMap::new())
    }
}

impl Zbdd {
    /// Builds the cut-set family of a BDD function: satisfying
    /// assignments projected to positive literals.
    ///
    /// Complemented low edges distribute their negation during the walk,
    /// so the projection is taken of the correctly signed function.
    pub fn from_bdd(bdd: &Bdd, root: Ref) -> (Zbdd, Ref) {
        let mut zbdd = Zbdd::default();
        let mut memo = HashMap::new();
        let f = zbdd.convert(bdd, root, &mut memo);
        (zbdd, f)
    }

    /// Converts one more BDD function into this ZBDD (shares the arena).
    pub fn convert(&mut self, bdd: &Bdd, f: Ref, memo: &mut HashMap<Ref, Ref>) -> Ref {
        if bdd.is_one(f) {
            return self.base;
        }
        if bdd.is_zero(f) {
            return self.empty;
        }
        if let Some(&res) = memo.get(&f) {
            return res;
        }

        let order = bdd.order(f.index());
        let high = self.convert(bdd, bdd.high_node(f), memo);
        let low = self.convert(bdd, bdd.low_node(f), memo);
        let res = self.mk_node(order, low, high);

        memo.insert(f, res);
        res
    }

    /// Iterates the family as sorted vectors of ordering positions.
    pub fn sets(&self, f: Ref) -> ZbddSets<'_> {
        ZbddSets::new(self, f)
    }
}

/// Stack-based iterator over the sets of a ZBDD family.
pub struct ZbddSets<'a> {
    zbdd: &'a Zbdd,
    stack: Vec<(Ref, Vec<u32>)>,
}

impl<'a> ZbddSets<'a> {
    fn new(zbdd: &'a Zbdd, node: Ref) -> Self {
        ZbddSets {
            zbdd,
            stack: vec![(node, Vec::new())],
        }
    }
}

impl<'a> Iterator for ZbddSets<'a> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, set)) = self.stack.pop() {
            if self.zbdd.is_empty(node) {
                continue;
            }
            if self.zbdd.is_base(node) {
                return Some(set);
            }

            let index = node.index();
            let v = self.zbdd.order(index);
            self.stack.push((self.zbdd.low(index), set.clone()));
            let mut with_v = set;
            with_v.push(v);
            self.stack.push((self.zbdd.high(index), with_v));
        }
        None
    }
}
