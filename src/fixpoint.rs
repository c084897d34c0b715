//! # Fixpoint Evaluation
//!
//! Stratified semi-naive evaluation of a query.
//!
//! ## Pipeline
//!
//! ```text
//! validate(rules, edb) -> adorn(query) -> strata -> for each stratum:
//!     simple rules once
//!     recursive rules: seed, then delta rounds until no new row
//! ```
//!
//! A rule is *simple* in its stratum if none of its body atoms names a
//! predicate of that stratum; otherwise it is *recursive*. Each round
//! evaluates every recursive rule once per choice of "full" or "delta" for
//! its in-stratum positive atoms, skipping the all-full choice and any choice
//! whose delta is empty. Rows not already present are the next delta. The
//! stratum is done after the first round that adds nothing.
//!
//! Validation runs before any evaluation; on failure no relation is returned.

use crate::adornment::{adorn, Adornment};
use crate::ast::{Rule, RuleSet};
use crate::config::Config;
use crate::error::{EvalError, EvalResult};
use crate::pipeline_trace::{EvalObserver, TracingObserver};
use crate::recursion::{check_stratified_negation, strata};
use crate::relation::{Relation, VecRelation};
use crate::rule_eval::eval_rule;
use crate::validation::validate;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Most in-stratum atoms one recursive rule may have; delta choices are
/// enumerated as bits of a `u64` mask
const MAX_RECURSIVE_ATOMS: usize = 63;

/// Extensional database: relation name to its facts
pub type Edb = HashMap<String, VecRelation>;

/// Relations visible while evaluating one query
struct Workspace<'a> {
    edb: &'a Edb,
    /// Derived relations, keyed by adorned name
    derived: HashMap<String, VecRelation>,
    /// Empty stand-ins for body atoms naming nothing known
    missing: HashMap<String, VecRelation>,
}

impl<'a> Workspace<'a> {
    fn new(edb: &'a Edb, rules: &RuleSet) -> Self {
        let mut derived = HashMap::new();
        for rule in rules.iter() {
            derived
                .entry(rule.head.name.clone())
                .or_insert_with(|| VecRelation::new(rule.head.arity()));
        }

        let mut missing = HashMap::new();
        for atom in rules.iter().flat_map(|r| r.body.iter()) {
            if derived.contains_key(&atom.name)
                || edb.contains_key(&atom.name)
                || missing.contains_key(&atom.name)
            {
                continue;
            }
            warn!(relation = %atom.name, "body atom names no rule and no fact relation; treating it as empty");
            missing.insert(atom.name.clone(), VecRelation::new(atom.arity()));
        }

        Workspace {
            edb,
            derived,
            missing,
        }
    }

    fn get(&self, name: &str) -> EvalResult<&dyn Relation> {
        self.derived
            .get(name)
            .or_else(|| self.edb.get(name))
            .or_else(|| self.missing.get(name))
            .map(|r| r as &dyn Relation)
            .ok_or_else(|| EvalError::MissingRelation(name.to_string()))
    }

    fn derived_mut(&mut self, name: &str) -> EvalResult<&mut VecRelation> {
        self.derived
            .get_mut(name)
            .ok_or_else(|| EvalError::MissingRelation(name.to_string()))
    }
}

/// Query evaluator.
///
/// Holds the run settings and the observer; a single evaluator can run any
/// number of queries.
#[derive(Clone)]
pub struct Evaluator {
    max_iterations: usize,
    trace_relations: bool,
    observer: Arc<dyn EvalObserver>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator {
            max_iterations: 0,
            trace_relations: false,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("max_iterations", &self.max_iterations)
            .field("trace_relations", &self.trace_relations)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Evaluator {
            max_iterations: config.evaluation.max_iterations,
            trace_relations: config.evaluation.trace_relations,
            ..Self::default()
        }
    }

    /// Limit semi-naive rounds per stratum; `0` means no limit
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Pass full result tables to the observer for every rule evaluation
    pub fn with_trace_relations(mut self, trace_relations: bool) -> Self {
        self.trace_relations = trace_relations;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EvalObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Evaluate `query` with its default binding pattern (see
    /// [`Adornment::for_query`]).
    ///
    /// A query naming only an EDB relation returns a copy of it.
    pub fn eval(&self, query: &str, rules: &RuleSet, edb: &Edb) -> EvalResult<VecRelation> {
        match Adornment::for_query(rules, query) {
            Some(pattern) => self.eval_with_pattern(query, &pattern, rules, edb),
            None => edb_query(query, edb),
        }
    }

    /// Evaluate `query` with an explicit binding pattern on its head
    pub fn eval_with_pattern(
        &self,
        query: &str,
        pattern: &Adornment,
        rules: &RuleSet,
        edb: &Edb,
    ) -> EvalResult<VecRelation> {
        if !rules.contains(query) {
            return edb_query(query, edb);
        }

        validate(query, pattern, rules, edb)?;

        let adorned = adorn(query, pattern, rules, &|name| edb.contains_key(name));
        self.observer.on_adorned(&adorned);

        let strata = strata(&adorned);
        check_stratified_negation(&adorned, &strata)?;

        let mut workspace = Workspace::new(edb, &adorned);
        for (index, stratum) in strata.iter().enumerate() {
            self.eval_stratum(index, stratum, &adorned, &mut workspace)?;
        }

        let name = pattern.adorned_name(query);
        let result = workspace
            .derived
            .remove(&name)
            .ok_or(EvalError::MissingRelation(name))?;
        self.observer.on_complete(query, &result);
        Ok(result)
    }

    fn eval_rule_traced(
        &self,
        stratum: usize,
        rule: &Rule,
        relations: &[&dyn Relation],
    ) -> EvalResult<VecRelation> {
        let result = eval_rule(rule, relations)?;
        let table = self.trace_relations.then_some(&result);
        self.observer.on_rule(stratum, rule, result.len(), table);
        Ok(result)
    }

    fn eval_stratum(
        &self,
        index: usize,
        stratum: &[String],
        rules: &RuleSet,
        workspace: &mut Workspace<'_>,
    ) -> EvalResult<()> {
        self.observer.on_stratum_start(index, stratum);

        let members: HashSet<&str> = stratum.iter().map(String::as_str).collect();
        let (recursive, simple): (Vec<&Rule>, Vec<&Rule>) = stratum
            .iter()
            .flat_map(|name| rules.rules_for(name))
            .partition(|rule| {
                rule.body
                    .iter()
                    .any(|atom| members.contains(atom.name.as_str()))
            });

        for rule in simple {
            let relations = body_relations(rule, workspace)?;
            let derived = self.eval_rule_traced(index, rule, &relations)?;
            workspace.derived_mut(&rule.head.name)?.insert_all(&derived);
        }

        if recursive.is_empty() {
            return Ok(());
        }

        // Positions of each recursive rule's positive in-stratum atoms
        let mut positions: Vec<Vec<usize>> = Vec::with_capacity(recursive.len());
        for rule in &recursive {
            let in_stratum: Vec<usize> = rule
                .body
                .iter()
                .enumerate()
                .filter(|(_, atom)| !atom.negated && members.contains(atom.name.as_str()))
                .map(|(i, _)| i)
                .collect();
            if in_stratum.len() > MAX_RECURSIVE_ATOMS {
                return Err(EvalError::TooManyRecursiveAtoms {
                    rule: rule.to_string(),
                    count: in_stratum.len(),
                    limit: MAX_RECURSIVE_ATOMS,
                });
            }
            positions.push(in_stratum);
        }

        // Seed: every recursive rule once against the full relations.
        let mut delta: HashMap<String, VecRelation> = HashMap::new();
        for rule in &recursive {
            let relations = body_relations(rule, workspace)?;
            let derived = self.eval_rule_traced(index, rule, &relations)?;
            collect_new_rows(&rule.head.name, &derived, workspace, &mut delta)?;
        }
        merge_delta(&delta, workspace)?;

        let mut round = 0;
        while delta.values().any(|d| !d.is_empty()) {
            round += 1;
            if self.max_iterations > 0 && round > self.max_iterations {
                return Err(EvalError::IterationLimit {
                    stratum: index,
                    limit: self.max_iterations,
                });
            }

            let mut next: HashMap<String, VecRelation> = HashMap::new();
            for (rule, in_stratum) in recursive.iter().zip(&positions) {
                for choice in delta_choices(in_stratum.len()) {
                    let mut relations = body_relations(rule, workspace)?;
                    let mut usable = true;
                    for (&position, &use_delta) in in_stratum.iter().zip(&choice) {
                        if !use_delta {
                            continue;
                        }
                        match delta.get(&rule.body[position].name) {
                            Some(d) if !d.is_empty() => relations[position] = d as &dyn Relation,
                            _ => {
                                usable = false;
                                break;
                            }
                        }
                    }
                    if !usable {
                        continue;
                    }

                    let derived = self.eval_rule_traced(index, rule, &relations)?;
                    collect_new_rows(&rule.head.name, &derived, workspace, &mut next)?;
                }
            }

            let new_rows = next.values().map(Relation::len).sum();
            merge_delta(&next, workspace)?;
            self.observer.on_round(index, round, new_rows);
            delta = next;
        }

        Ok(())
    }
}

/// Evaluate with a default [`Evaluator`]
pub fn eval(query: &str, rules: &RuleSet, edb: &Edb) -> EvalResult<VecRelation> {
    Evaluator::default().eval(query, rules, edb)
}

fn edb_query(query: &str, edb: &Edb) -> EvalResult<VecRelation> {
    edb.get(query)
        .cloned()
        .ok_or_else(|| EvalError::UnknownQuery(query.to_string()))
}

fn body_relations<'w>(rule: &Rule, workspace: &'w Workspace<'_>) -> EvalResult<Vec<&'w dyn Relation>> {
    rule.body
        .iter()
        .map(|atom| workspace.get(&atom.name))
        .collect()
}

/// Every full/delta choice over `count` positions except all-full;
/// `true` selects the delta. `count` is at most [`MAX_RECURSIVE_ATOMS`].
fn delta_choices(count: usize) -> impl Iterator<Item = Vec<bool>> {
    (1u64..(1u64 << count)).map(move |mask| (0..count).map(|bit| mask & (1 << bit) != 0).collect())
}

fn collect_new_rows(
    head: &str,
    derived: &VecRelation,
    workspace: &Workspace<'_>,
    delta: &mut HashMap<String, VecRelation>,
) -> EvalResult<()> {
    let full = workspace.get(head)?;
    let target = delta
        .entry(head.to_string())
        .or_insert_with(|| VecRelation::new(derived.arity()));
    for row in derived.iter() {
        if !full.includes(row) {
            target.insert(row.clone());
        }
    }
    Ok(())
}

fn merge_delta(delta: &HashMap<String, VecRelation>, workspace: &mut Workspace<'_>) -> EvalResult<()> {
    for (name, rows) in delta {
        workspace.derived_mut(name)?.insert_all(rows);
    }
    Ok(())
}
