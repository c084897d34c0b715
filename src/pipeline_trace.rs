//! # Pipeline Trace
//!
//! Observation points of the evaluation pipeline:
//! Adorn -> Stratify -> (per stratum) simple rules -> semi-naive rounds -> Result
//!
//! The evaluator reports progress to an [`EvalObserver`] instead of printing.
//! [`TracingObserver`] forwards everything to `tracing`; [`RecordingObserver`]
//! keeps the events in memory and can render them as a report.

use crate::ast::{Rule, RuleSet};
use crate::relation::{Relation, VecRelation};
use parking_lot::Mutex;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Hook called by the evaluator at fixed points of a run.
///
/// All methods default to doing nothing. `relation` arguments are only
/// supplied when relation tracing is enabled in the evaluator.
pub trait EvalObserver: Send + Sync {
    /// The adorned rule set produced for the query
    fn on_adorned(&self, _rules: &RuleSet) {}

    /// A stratum is about to be evaluated
    fn on_stratum_start(&self, _stratum: usize, _predicates: &[String]) {}

    /// One rule evaluation finished
    fn on_rule(&self, _stratum: usize, _rule: &Rule, _derived: usize, _relation: Option<&VecRelation>) {}

    /// A semi-naive round finished with `new_rows` rows not seen before
    fn on_round(&self, _stratum: usize, _round: usize, _new_rows: usize) {}

    /// Evaluation finished with the query's relation
    fn on_complete(&self, _query: &str, _result: &VecRelation) {}
}

/// Observer that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EvalObserver for NoopObserver {}

/// Observer that emits `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EvalObserver for TracingObserver {
    fn on_adorned(&self, rules: &RuleSet) {
        for rule in rules.iter() {
            debug!(rule = %rule, "adorned rule");
        }
    }

    fn on_stratum_start(&self, stratum: usize, predicates: &[String]) {
        info!(stratum, predicates = ?predicates, "evaluating stratum");
    }

    fn on_rule(&self, stratum: usize, rule: &Rule, derived: usize, relation: Option<&VecRelation>) {
        match relation {
            Some(rows) => debug!(stratum, rule = %rule, derived, "rule evaluated\n{rows}"),
            None => debug!(stratum, rule = %rule, derived, "rule evaluated"),
        }
    }

    fn on_round(&self, stratum: usize, round: usize, new_rows: usize) {
        debug!(stratum, round, new_rows, "semi-naive round");
    }

    fn on_complete(&self, query: &str, result: &VecRelation) {
        info!(query, rows = result.len(), "evaluation complete");
    }
}

/// One recorded observer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Adorned { rules: Vec<String> },
    StratumStart { stratum: usize, predicates: Vec<String> },
    Rule { stratum: usize, rule: String, derived: usize, table: Option<String> },
    Round { stratum: usize, round: usize, new_rows: usize },
    Complete { query: String, rows: usize },
}

/// Observer that records every event, for tests and reports
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Number of semi-naive rounds recorded for `stratum`
    pub fn rounds(&self, stratum: usize) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TraceEvent::Round { stratum: s, .. } if *s == stratum))
            .count()
    }

    /// Format the trace for display
    pub fn format_trace(&self) -> String {
        let mut output = String::new();

        output.push_str("═══════════════════════════════════════════════════════════\n");
        output.push_str("                    EVALUATION TRACE                        \n");
        output.push_str("═══════════════════════════════════════════════════════════\n\n");

        for event in self.events() {
            let _ = match event {
                TraceEvent::Adorned { rules } => {
                    output.push_str("ADORNED RULES:\n");
                    for rule in rules {
                        let _ = writeln!(output, "  {rule}");
                    }
                    writeln!(output)
                }
                TraceEvent::StratumStart { stratum, predicates } => {
                    writeln!(output, "STRATUM {stratum}: {}", predicates.join(", "))
                }
                TraceEvent::Rule {
                    rule,
                    derived,
                    table,
                    ..
                } => {
                    let _ = writeln!(output, "  {rule}  => {derived} rows");
                    match table {
                        Some(table) => write!(output, "{table}"),
                        None => Ok(()),
                    }
                }
                TraceEvent::Round { round, new_rows, .. } => {
                    writeln!(output, "  round {round}: {new_rows} new rows")
                }
                TraceEvent::Complete { query, rows } => {
                    writeln!(output, "\nRESULT {query}: {rows} rows")
                }
            };
        }

        output
    }
}

impl EvalObserver for RecordingObserver {
    fn on_adorned(&self, rules: &RuleSet) {
        self.push(TraceEvent::Adorned {
            rules: rules.iter().map(ToString::to_string).collect(),
        });
    }

    fn on_stratum_start(&self, stratum: usize, predicates: &[String]) {
        self.push(TraceEvent::StratumStart {
            stratum,
            predicates: predicates.to_vec(),
        });
    }

    fn on_rule(&self, stratum: usize, rule: &Rule, derived: usize, relation: Option<&VecRelation>) {
        self.push(TraceEvent::Rule {
            stratum,
            rule: rule.to_string(),
            derived,
            table: relation.map(ToString::to_string),
        });
    }

    fn on_round(&self, stratum: usize, round: usize, new_rows: usize) {
        self.push(TraceEvent::Round {
            stratum,
            round,
            new_rows,
        });
    }

    fn on_complete(&self, query: &str, result: &VecRelation) {
        self.push(TraceEvent::Complete {
            query: query.to_string(),
            rows: result.len(),
        });
    }
}
