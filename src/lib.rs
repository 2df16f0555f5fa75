//! # fta-rs: Fault Tree Analysis with Binary Decision Diagrams
//!
//! **`fta-rs`** is a probabilistic risk analysis engine for fault trees:
//! given a hierarchical Boolean formula over events with failure
//! probabilities, it computes the *minimal cut sets* (the smallest
//! combinations of basic-event failures that cause the top event) and,
//! optionally, their probabilities and per-event importance factors.
//!
//! ## Pipeline
//!
//! 1. The validated [`model`] is converted into an indexed Boolean
//!    [`graph`], a DAG of gates and variables with signed references.
//! 2. The [`preprocess`] passes normalize the graph: constants fold,
//!    K-of-N and XOR expand, negations push down to literals, gates
//!    coalesce, independent sub-trees become modules, and variables get
//!    a total ordering.
//! 3. The [`bdd`] manager builds a Reduced Ordered BDD with complement
//!    edges over the normalized graph through hash-consed if-then-else
//!    vertices.
//! 4. The [`zbdd`] converts the BDD into a zero-suppressed family of cut
//!    sets and minimizes it by subsumption; [`prob`] and [`importance`]
//!    quantify the result.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fta_rs::analysis::{FaultTreeAnalysis, Settings};
//! use fta_rs::model::{Arg, Connective, Formula, Model};
//!
//! // top = pump AND valve
//! let mut model = Model::new("top");
//! model.add_basic_event("pump", 0.1).unwrap();
//! model.add_basic_event("valve", 0.2).unwrap();
//! model
//!     .add_gate(
//!         "top",
//!         Formula::new(Connective::And)
//!             .arg(Arg::basic("pump"))
//!             .arg(Arg::basic("valve")),
//!     )
//!     .unwrap();
//!
//! let settings = Settings::default().probability_analysis(true);
//! let analysis = FaultTreeAnalysis::new(model, settings).unwrap().analyze().unwrap();
//!
//! assert_eq!(analysis.cut_sets.len(), 1); // the single cut set {pump, valve}
//! assert!((analysis.probability.unwrap() - 0.02).abs() < 1e-12);
//! ```
//!
//! ## Core Components
//!
//! - **[`analysis`]**: the facade: settings, orchestration, results.
//! - **[`graph`]**: the mutable Boolean graph and its argument-addition
//!   contract.
//! - **[`bdd`]**: the ROBDD manager and `apply` algorithms.
//! - **[`zbdd`]**: minimal cut set enumeration.
//!
//! The crate does no I/O: input parsing, report generation, and
//! configuration loading live in collaborators.

pub mod analysis;
pub mod bdd;
pub mod cache;
pub mod error;
pub mod graph;
pub mod hash;
pub mod importance;
pub mod model;
pub mod node;
pub mod preprocess;
pub mod prob;
pub mod reference;
pub mod storage;
pub mod zbdd;
