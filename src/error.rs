use thiserror::Error;

use crate::analysis::Algorithm;

/// Errors reported by the analysis core.
///
/// Internal invariant violations (broken canonical form, inconsistent
/// bookkeeping) are bugs and assert instead of returning an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The input model is malformed (dangling reference, bad probability,
    /// duplicate id).
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Graph construction violated a connective's arity or threshold
    /// constraints.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Analysis settings are out of their documented domain.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The requested cut-set engine is not provided by this crate.
    #[error("algorithm {0:?} is not supported; use Algorithm::Bdd")]
    UnsupportedAlgorithm(Algorithm),
}
