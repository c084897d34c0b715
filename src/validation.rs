//! # Validation
//!
//! Structural checks on the unadorned input, run before any evaluation:
//! rule safety, atom arities, the query pattern width and value kinds.
//!
//! ## Kind checking
//!
//! Every (relation, column) pair holds values of one kind. Kinds are known
//! from fact rows and from constants, and flow through variables:
//!
//! ```text
//! q = {(1)}
//! p(X) :- q(X), X < "zzz".     // X is unsigned int via q; "zzz" is not
//! p(X) :- q(X), r(X).          // X must have the kind of both q and r
//! ```
//!
//! Inference repeats over all rules until no new kind is learned, so a
//! mismatch is reported no matter which rows reach it at run time.

use crate::adornment::Adornment;
use crate::ast::RuleSet;
use crate::error::{EvalError, EvalResult};
use crate::fixpoint::Edb;
use crate::relation::{Relation, VecRelation};
use crate::safety::check_program_safety;
use crate::value::{Value, Variable};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Validate `rules` and `edb` for a query with the given head pattern
pub fn validate(query: &str, pattern: &Adornment, rules: &RuleSet, edb: &Edb) -> EvalResult<()> {
    check_program_safety(rules)?;
    check_arities(query, pattern, rules, edb)?;

    let mut kinds = KindTable::default();
    let mut names: Vec<&String> = edb.keys().collect();
    names.sort();
    for name in names {
        kinds.seed(name, &edb[name])?;
    }
    kinds.check_rules(rules)
}

/// Every atom agrees with the width of the relation it names
fn check_arities(query: &str, pattern: &Adornment, rules: &RuleSet, edb: &Edb) -> EvalResult<()> {
    let mut arities: HashMap<&str, usize> = edb
        .iter()
        .map(|(name, rel)| (name.as_str(), rel.arity()))
        .collect();
    for rule in rules.iter() {
        arities
            .entry(rule.head.name.as_str())
            .or_insert_with(|| rule.head.arity());
    }

    for rule in rules.iter() {
        for atom in std::iter::once(&rule.head).chain(&rule.body) {
            let expected = *arities
                .entry(atom.name.as_str())
                .or_insert_with(|| atom.arity());
            if expected != atom.arity() {
                return Err(EvalError::ArityMismatch {
                    relation: atom.name.clone(),
                    expected,
                    found: atom.arity(),
                });
            }
        }
    }

    let query_arity = arities.get(query).copied().unwrap_or_default();
    if pattern.arity() != query_arity {
        return Err(EvalError::ArityMismatch {
            relation: pattern.adorned_name(query),
            expected: query_arity,
            found: pattern.arity(),
        });
    }
    Ok(())
}

/// A sample value per (relation, column); the sample's kind is the column's
#[derive(Debug, Default)]
struct KindTable<'a> {
    columns: HashMap<(&'a str, usize), Value>,
}

impl<'a> KindTable<'a> {
    /// Learn column kinds from fact rows; a column mixing kinds is an error
    fn seed(&mut self, name: &'a str, relation: &VecRelation) -> EvalResult<()> {
        for row in relation.iter() {
            for (col, value) in row.iter().enumerate() {
                match self.columns.entry((name, col)) {
                    Entry::Occupied(known) => same_kind(known.get(), value)?,
                    Entry::Vacant(slot) => {
                        slot.insert(value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Propagate kinds through every rule until nothing new is learned
    fn check_rules(&mut self, rules: &'a RuleSet) -> EvalResult<()> {
        let mut variables: Vec<HashMap<&'a str, Value>> =
            rules.iter().map(|_| HashMap::new()).collect();

        loop {
            let mut changed = false;
            for (rule, vars) in rules.iter().zip(variables.iter_mut()) {
                for atom in std::iter::once(&rule.head).chain(&rule.body) {
                    for (col, term) in atom.variables.iter().enumerate() {
                        changed |= self.unify_column(&atom.name, col, term, vars)?;
                    }
                }
                for constraint in &rule.constraints {
                    changed |= unify_operands(&constraint.operand1, &constraint.operand2, vars)?;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// Unify a term with the column it occupies; true if a kind was learned
    fn unify_column(
        &mut self,
        relation: &'a str,
        col: usize,
        term: &'a Variable,
        vars: &mut HashMap<&'a str, Value>,
    ) -> EvalResult<bool> {
        let column = self.columns.get(&(relation, col)).cloned();
        match (column, term_kind(term, vars)) {
            (Some(column), Some(value)) => {
                same_kind(&column, &value)?;
                Ok(false)
            }
            (Some(column), None) => Ok(bind(term, column, vars)),
            (None, Some(value)) => {
                self.columns.insert((relation, col), value);
                Ok(true)
            }
            (None, None) => Ok(false),
        }
    }
}

/// Both operands of a constraint must have the same kind
fn unify_operands<'a>(
    left: &'a Variable,
    right: &'a Variable,
    vars: &mut HashMap<&'a str, Value>,
) -> EvalResult<bool> {
    match (term_kind(left, vars), term_kind(right, vars)) {
        (Some(a), Some(b)) => {
            same_kind(&a, &b)?;
            Ok(false)
        }
        (Some(a), None) => Ok(bind(right, a, vars)),
        (None, Some(b)) => Ok(bind(left, b, vars)),
        (None, None) => Ok(false),
    }
}

fn term_kind(term: &Variable, vars: &HashMap<&str, Value>) -> Option<Value> {
    match term {
        Variable::Bound(value) => Some(value.clone()),
        Variable::Free(name) => vars.get(name.as_str()).cloned(),
    }
}

fn bind<'a>(term: &'a Variable, sample: Value, vars: &mut HashMap<&'a str, Value>) -> bool {
    match term.name() {
        Some(name) => vars.insert(name, sample).is_none(),
        None => false,
    }
}

fn same_kind(left: &Value, right: &Value) -> EvalResult<()> {
    if left.kind() == right.kind() {
        Ok(())
    } else {
        Err(EvalError::TypeMismatch {
            left: left.clone(),
            right: right.clone(),
        })
    }
}
