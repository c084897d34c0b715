//! # Adornment
//!
//! Binding-pattern specialization of a rule set for one query.
//!
//! Every derived predicate reachable from the query is renamed to
//! `name^pattern`, where the pattern has one letter per argument: `b` if the
//! argument is known when the atom is reached, `f` otherwise. Knowledge flows
//! from the head pattern through the body left to right; a positive atom
//! binds all of its variables for the atoms after it.
//!
//! ## Example
//!
//! ```datalog
//! tc(X, Y) :- edge(X, Y).
//! tc(X, Y) :- edge(X, Z), tc(Z, Y).
//! ```
//!
//! adorned for `tc^ff` gives
//!
//! ```datalog
//! tc^ff(X, Y) :- edge(X, Y).
//! tc^ff(X, Y) :- edge(X, Z), tc^bf(Z, Y).
//! tc^bf(X, Y) :- edge(X, Y).
//! tc^bf(X, Y) :- edge(X, Z), tc^bf(Z, Y).
//! ```
//!
//! Extensional predicates keep their names. The input rule set is never
//! modified; the adorned rules are fresh values in a new [`RuleSet`].
//!
//! Each `(name, pattern)` pair is specialized at most once, which makes the
//! pass terminate on recursive predicates and makes it idempotent.

use crate::ast::{Predicate, Rule, RuleSet};
use crate::value::Variable;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Binding adornment for a predicate: `true` = bound, `false` = free
///
/// For `reach^bf`, positions = [true, false] meaning first arg bound, second free.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Adornment {
    pub positions: Vec<bool>,
}

impl Adornment {
    pub fn new(positions: Vec<bool>) -> Self {
        Adornment { positions }
    }

    /// All arguments free
    pub fn free(arity: usize) -> Self {
        Adornment::new(vec![false; arity])
    }

    /// Parse a `b`/`f` suffix such as `"bf"`
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        suffix
            .chars()
            .map(|c| match c {
                'b' => Some(true),
                'f' => Some(false),
                _ => None,
            })
            .collect::<Option<Vec<bool>>>()
            .map(Adornment::new)
    }

    /// Produce the adornment string suffix like "bf", "bb", "fb"
    pub fn suffix(&self) -> String {
        self.positions
            .iter()
            .map(|b| if *b { 'b' } else { 'f' })
            .collect()
    }

    pub fn arity(&self) -> usize {
        self.positions.len()
    }

    /// `name^suffix`
    pub fn adorned_name(&self, name: &str) -> String {
        format!("{name}^{}", self.suffix())
    }

    /// Pattern of `atom` given the variable names known so far
    pub fn for_atom(atom: &Predicate, bound: &HashSet<String>) -> Self {
        Adornment::new(
            atom.variables
                .iter()
                .map(|var| match var {
                    Variable::Bound(_) => true,
                    Variable::Free(name) => bound.contains(name),
                })
                .collect(),
        )
    }

    /// Default pattern for a query: a position is bound iff every rule for
    /// the query has a constant there
    pub fn for_query(rules: &RuleSet, query: &str) -> Option<Self> {
        let candidates = rules.rules_for(query);
        let first = candidates.first()?;
        Some(Adornment::new(
            (0..first.head.arity())
                .map(|pos| {
                    candidates.iter().all(|rule| {
                        rule.head
                            .variables
                            .get(pos)
                            .is_some_and(Variable::is_bound)
                    })
                })
                .collect(),
        ))
    }
}

impl fmt::Display for Adornment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix())
    }
}

/// Specialize one rule for a head pattern.
///
/// Returns the renamed rule and the `(predicate, pattern)` demands of its
/// derived body atoms. Atoms whose name has no rules in `rules`, or that name
/// an extensional relation, are left unrenamed.
pub fn adorn_rule(
    rule: &Rule,
    pattern: &Adornment,
    rules: &RuleSet,
    is_edb: &dyn Fn(&str) -> bool,
) -> (Rule, Vec<(String, Adornment)>) {
    let mut bound: HashSet<String> = rule
        .head
        .variables
        .iter()
        .zip(&pattern.positions)
        .filter(|(_, is_bound)| **is_bound)
        .filter_map(|(var, _)| var.name().map(str::to_string))
        .collect();

    let mut demands = Vec::new();
    let mut body = Vec::with_capacity(rule.body.len());
    for atom in &rule.body {
        let mut adorned = atom.clone();
        if !is_edb(&atom.name) && rules.contains(&atom.name) {
            let atom_pattern = Adornment::for_atom(atom, &bound);
            adorned.name = atom_pattern.adorned_name(&atom.name);
            demands.push((atom.name.clone(), atom_pattern));
        }
        if !atom.negated {
            bound.extend(atom.free_names().map(str::to_string));
        }
        body.push(adorned);
    }

    let head = Predicate::new(pattern.adorned_name(&rule.head.name), rule.head.variables.clone());
    let adorned = Rule {
        head,
        body,
        constraints: rule.constraints.clone(),
    };
    (adorned, demands)
}

/// Adorn every rule reachable from `query` under `pattern`.
///
/// The query's rules are specialized under `pattern`; every derived body atom
/// schedules its predicate under the pattern computed for it, once per
/// distinct `(name, pattern)`.
pub fn adorn(
    query: &str,
    pattern: &Adornment,
    rules: &RuleSet,
    is_edb: &dyn Fn(&str) -> bool,
) -> RuleSet {
    let mut adorned = RuleSet::new();
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut worklist: VecDeque<(String, Adornment)> = VecDeque::new();

    scheduled.insert(pattern.adorned_name(query));
    worklist.push_back((query.to_string(), pattern.clone()));

    while let Some((name, pattern)) = worklist.pop_front() {
        for rule in rules.rules_for(&name) {
            let (rule, demands) = adorn_rule(rule, &pattern, rules, is_edb);
            for (demand, demand_pattern) in demands {
                if scheduled.insert(demand_pattern.adorned_name(&demand)) {
                    worklist.push_back((demand, demand_pattern));
                }
            }
            adorned.insert(rule);
        }
    }

    adorned
}
