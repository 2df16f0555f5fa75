use crate::hash::{vertex_hash, TableHash};
use crate::reference::Ref;

/// If-then-else vertex of the ROBDD.
///
/// # Fields
///
/// - `order`: position of the decision variable in the chosen ordering
///   (1-indexed; 0 is reserved for the terminal)
/// - `high`: 1-branch, never complemented (canonical form)
/// - `low`: 0-branch; the sign of the `Ref` is the complement attribute
///
/// Each vertex is a Shannon decomposition:
/// ```text
/// f = (v ∧ f_high) ∨ (¬v ∧ f_low)
/// ```
///
/// Equality and hash cover exactly the unique-table key
/// `(order, high, signed low)`, so [`Storage::put`][crate::storage::Storage::put]
/// is the unique-table lookup.
#[derive(Debug, Copy, Clone)]
pub struct Ite {
    pub order: u32,
    pub high: Ref,
    pub low: Ref,
    /// Precomputed hash of `(order, high, low)`.
    hash: u64,
}

impl Ite {
    pub fn new(order: u32, high: Ref, low: Ref) -> Self {
        debug_assert_ne!(order, 0, "Order zero is reserved for the terminal");
        debug_assert!(!high.is_negated(), "The high edge must not be complemented");
        let hash = vertex_hash(order, high, low);
        Self { order, high, low, hash }
    }

    /// The single terminal vertex (logical One), stored at arena index 1.
    pub fn terminal() -> Self {
        Self {
            order: 0,
            high: Ref::positive(1),
            low: Ref::positive(1),
            hash: 0,
        }
    }
}

impl TableHash for Ite {
    fn table_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for Ite {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.order == other.order
            && self.high == other.high
            && self.low == other.low
    }
}

impl Eq for Ite {}

/// ZBDD vertex: a family-of-sets decision point.
///
/// No complement edges; `high` holds the sets containing the variable
/// (with the variable removed), `low` the sets without it.
#[derive(Debug, Copy, Clone)]
pub struct SetNode {
    pub order: u32,
    pub high: Ref,
    pub low: Ref,
    hash: u64,
}

impl SetNode {
    pub fn new(order: u32, high: Ref, low: Ref) -> Self {
        debug_assert_ne!(order, 0, "Order zero is reserved for terminals");
        debug_assert!(!high.is_negated());
        debug_assert!(!low.is_negated());
        let hash = vertex_hash(order, high, low);
        Self { order, high, low, hash }
    }

    /// Placeholder record for the two terminal slots (∅ and {∅}).
    pub fn terminal() -> Self {
        Self {
            order: 0,
            high: Ref::positive(1),
            low: Ref::positive(1),
            hash: 0,
        }
    }
}

impl TableHash for SetNode {
    fn table_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for SetNode {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.order == other.order
            && self.high == other.high
            && self.low == other.low
    }
}

impl Eq for SetNode {}
