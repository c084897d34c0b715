//! # Program Documents
//!
//! A self-contained, serde-loadable bundle of facts, rules and a query, used
//! by the `stratalog` binary.
//!
//! ```json
//! {
//!   "query": "tc",
//!   "facts": { "edge": [[1, 2], [2, 3]] },
//!   "rules": [
//!     { "head": {"name": "tc", "variables": [{"var": "X"}, {"var": "Y"}]},
//!       "body": [{"name": "edge", "variables": [{"var": "X"}, {"var": "Y"}]}] }
//!   ]
//! }
//! ```
//!
//! Rules use the serde form of [`Rule`]; there is no textual Datalog syntax.

use crate::ast::{Rule, RuleSet};
use crate::error::EvalError;
use crate::fixpoint::{Edb, Evaluator};
use crate::relation::VecRelation;
use crate::value::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or running a program document
#[derive(Error, Debug)]
pub enum ProgramError {
    /// The document could not be read
    #[error("Cannot read program '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document is not valid JSON or does not match the schema
    #[error("Invalid program document: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation or evaluation failed
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Facts, rules and the query to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDocument {
    pub query: String,
    #[serde(default)]
    pub facts: BTreeMap<String, Vec<Row>>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl ProgramDocument {
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn rule_set(&self) -> RuleSet {
        self.rules.iter().cloned().collect()
    }

    /// Build the fact relations.
    ///
    /// A relation's arity comes from its first row. An empty fact list takes
    /// the arity of the first atom mentioning it, or 0 if none does.
    pub fn edb(&self) -> Result<Edb, EvalError> {
        let mut edb = Edb::new();
        for (name, rows) in &self.facts {
            let arity = match rows.first() {
                Some(row) => row.len(),
                None => self.atom_arity(name).unwrap_or_default(),
            };
            let relation = VecRelation::from_rows(arity, rows.iter().cloned()).map_err(|err| {
                match err {
                    EvalError::ArityMismatch {
                        expected, found, ..
                    } => EvalError::ArityMismatch {
                        relation: name.clone(),
                        expected,
                        found,
                    },
                    other => other,
                }
            })?;
            edb.insert(name.clone(), relation);
        }
        Ok(edb)
    }

    fn atom_arity(&self, name: &str) -> Option<usize> {
        self.rules
            .iter()
            .flat_map(|rule| std::iter::once(&rule.head).chain(&rule.body))
            .find(|atom| atom.name == name)
            .map(|atom| atom.arity())
    }

    /// Evaluate the document's query, or `query` if given
    pub fn run(&self, evaluator: &Evaluator, query: Option<&str>) -> Result<VecRelation, ProgramError> {
        let query = query.unwrap_or(&self.query);
        let edb = self.edb()?;
        Ok(evaluator.eval(query, &self.rule_set(), &edb)?)
    }
}
