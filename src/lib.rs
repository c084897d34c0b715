//! # Stratalog
//!
//! A small stratified Datalog engine: indexed in-memory relations, a rule
//! safety checker, binding-pattern adornment and a semi-naive fixpoint
//! evaluator.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! query + RuleSet (IDB) + Edb
//!     ↓
//! [Validation]        → safety, arities, value kinds
//!     ↓
//! [Adornment]         → name^pattern specialized RuleSet
//!     ↓
//! [Stratification]    → ordered groups of mutually recursive predicates
//!     ↓
//! [Fixpoint]          → simple rules once, recursive rules by delta rounds
//!     ↓                   (each rule: join → negation → constraints → head)
//! VecRelation bound to the query
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use stratalog::ast::builders::RuleBuilder;
//! use stratalog::{eval, Edb, Relation, RuleSet, Value, VecRelation};
//!
//! let rules: RuleSet = vec![
//!     RuleBuilder::new("path")
//!         .head_vars(["X", "Y"])
//!         .body_atom("edge", ["X", "Y"])
//!         .build(),
//!     RuleBuilder::new("path")
//!         .head_vars(["X", "Y"])
//!         .body_atom("edge", ["X", "Z"])
//!         .body_atom("path", ["Z", "Y"])
//!         .build(),
//! ]
//! .into_iter()
//! .collect();
//!
//! let edge = VecRelation::from_rows(
//!     2,
//!     [(1u64, 2u64), (2, 3), (3, 4)]
//!         .into_iter()
//!         .map(|(a, b)| vec![Value::from(a), Value::from(b)]),
//! )?;
//! let mut edb = Edb::new();
//! edb.insert("edge".to_string(), edge);
//!
//! let path = eval("path", &rules, &edb)?;
//! assert_eq!(path.len(), 6);
//! assert!(path.includes(&[Value::from(1u64), Value::from(4u64)]));
//! # Ok::<(), stratalog::EvalError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Scalars, logic variables, rows |
//! | `ast` | Predicates, constraints, rules, rule sets |
//! | `hash_index` | Per-column value → row-id index |
//! | `relation` | `Relation` trait and `VecRelation` store |
//! | `join` | Nested-loop index join |
//! | `rule_eval` | Single-rule evaluation |
//! | `safety` | Rule safety checking |
//! | `validation` | Arity and value-kind checks before evaluation |
//! | `recursion` | Dependency analysis and stratification |
//! | `adornment` | Binding-pattern specialization |
//! | `fixpoint` | Stratified semi-naive evaluation |
//! | `pipeline_trace` | Evaluation observers |
//! | `program` | JSON program documents |
//! | `config` | Layered configuration |

pub mod adornment;
pub mod ast;
pub mod config;
pub mod error;
pub mod fixpoint;
pub mod hash_index;
pub mod join;
pub mod pipeline_trace;
pub mod program;
pub mod recursion;
pub mod relation;
pub mod rule_eval;
pub mod safety;
pub mod validation;
pub mod value;

// Re-export public types
pub use adornment::{adorn, Adornment};
pub use ast::{Constraint, ConstraintOp, Predicate, Rule, RuleSet};
pub use config::Config;
pub use error::{EvalError, EvalResult};
pub use fixpoint::{eval, Edb, Evaluator};
pub use pipeline_trace::{EvalObserver, RecordingObserver, TraceEvent, TracingObserver};
pub use program::{ProgramDocument, ProgramError};
pub use relation::{Relation, VecRelation};
pub use rule_eval::eval_rule;
pub use safety::{check_rule_safety, is_safe};
pub use value::{Row, Value, ValueKind, Variable};

// Re-export recursion utilities
pub use recursion::{derives, mutual_rec, strata, DependencyGraph, DependencyType};
