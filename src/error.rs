//! Evaluation Error Types

use crate::value::Value;
use thiserror::Error;

/// Errors surfaced by validation and evaluation.
///
/// All of these are structural: evaluation is deterministic, so the same
/// inputs fail the same way every time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A head, negated or constrained variable never occurs in a positive body atom
    #[error("Unsafe rule '{rule}': variables {variables:?} do not appear in a positive body atom")]
    UnsafeRule { rule: String, variables: Vec<String> },

    /// The query names neither an IDB predicate nor an EDB relation
    #[error("Unknown query: '{0}' has no rules and no facts")]
    UnknownQuery(String),

    /// Two values of different kinds were ordered against each other
    #[error("Type mismatch: cannot compare {left} ({}) with {right} ({})", .left.kind(), .right.kind())]
    TypeMismatch { left: Value, right: Value },

    /// An atom or a row disagrees with the width of the relation it references
    #[error("Arity mismatch for '{relation}': expected {expected} columns, found {found}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        found: usize,
    },

    /// A negated atom refers to a predicate of the rule's own recursive stratum
    #[error("Rule '{rule}' negates '{predicate}', which is mutually recursive with its head")]
    UnstratifiableNegation { rule: String, predicate: String },

    /// The configured limit on semi-naive rounds was reached
    #[error("Iteration limit exceeded in stratum {stratum}: {limit} rounds without reaching a fixpoint")]
    IterationLimit { stratum: usize, limit: usize },

    /// A recursive rule has more in-stratum atoms than delta choices can enumerate
    #[error("Rule '{rule}' has {count} recursive body atoms; at most {limit} are supported")]
    TooManyRecursiveAtoms {
        rule: String,
        count: usize,
        limit: usize,
    },

    /// A relation referenced during evaluation was never registered
    #[error("Relation '{0}' is not available during evaluation")]
    MissingRelation(String),
}

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;
