//! # Rule Types
//!
//! Predicates, constraints and rules as plain data. There is no textual
//! parser: callers build these values directly (see [`builders`] for a fluent
//! API) and the engine consumes them.
//!
//! `Display` renders each type in conventional Datalog notation:
//!
//! ```text
//! reach(X, Y) :- edge(X, Z), reach(Z, Y), !blocked(Z), X < 100
//! ```

use crate::error::{EvalError, EvalResult};
use crate::value::{Row, Value, Variable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

pub mod builders;

/// One atom: a rule head or a (possibly negated) body atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub negated: bool,
}

impl Predicate {
    pub fn new(name: impl Into<String>, variables: Vec<Variable>) -> Self {
        Predicate {
            name: name.into(),
            variables,
            negated: false,
        }
    }

    /// Same atom with negation-as-failure applied
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn arity(&self) -> usize {
        self.variables.len()
    }

    /// Names of the free variables, in argument order (repeats included)
    pub fn free_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().filter_map(Variable::name)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        let args: Vec<String> = self.variables.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

/// Comparison operator of a linear constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOp {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl ConstraintOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintOp::Less => "<",
            ConstraintOp::LessOrEqual => "<=",
            ConstraintOp::Greater => ">",
            ConstraintOp::GreaterOrEqual => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ConstraintOp::Less => ordering == Ordering::Less,
            ConstraintOp::LessOrEqual => ordering != Ordering::Greater,
            ConstraintOp::Greater => ordering == Ordering::Greater,
            ConstraintOp::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

/// Ordering test between two operands, each a constant or a body variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    pub op: ConstraintOp,
    pub operand1: Variable,
    pub operand2: Variable,
}

impl Constraint {
    pub fn new(op: ConstraintOp, operand1: Variable, operand2: Variable) -> Self {
        Constraint {
            op,
            operand1,
            operand2,
        }
    }

    pub fn operands(&self) -> [&Variable; 2] {
        [&self.operand1, &self.operand2]
    }

    /// Evaluate against an intermediate row.
    ///
    /// `binding` maps each free variable name to its column in `row`.
    pub fn holds(&self, binding: &HashMap<String, usize>, row: &Row) -> EvalResult<bool> {
        let a = self.resolve(&self.operand1, binding, row)?;
        let b = self.resolve(&self.operand2, binding, row)?;
        Ok(self.op.accepts(a.try_cmp(b)?))
    }

    fn resolve<'a>(
        &self,
        operand: &'a Variable,
        binding: &HashMap<String, usize>,
        row: &'a Row,
    ) -> EvalResult<&'a Value> {
        match operand {
            Variable::Bound(value) => Ok(value),
            Variable::Free(name) => binding
                .get(name)
                .and_then(|col| row.get(*col))
                .ok_or_else(|| EvalError::UnsafeRule {
                    rule: self.to_string(),
                    variables: vec![name.clone()],
                }),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operand1, self.op.as_str(), self.operand2)
    }
}

/// `head :- body, constraints`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub head: Predicate,
    #[serde(default)]
    pub body: Vec<Predicate>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Rule {
    pub fn new(head: Predicate, body: Vec<Predicate>) -> Self {
        Rule {
            head,
            body,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Non-negated body atoms, in body order
    pub fn positive_atoms(&self) -> impl Iterator<Item = &Predicate> {
        self.body.iter().filter(|p| !p.negated)
    }

    /// Negated body atoms, in body order
    pub fn negated_atoms(&self) -> impl Iterator<Item = &Predicate> {
        self.body.iter().filter(|p| p.negated)
    }

    /// Names of free variables bound by some positive body atom
    pub fn positive_variables(&self) -> HashSet<&str> {
        self.positive_atoms().flat_map(Predicate::free_names).collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if self.body.is_empty() && self.constraints.is_empty() {
            return Ok(());
        }
        let parts: Vec<String> = self
            .body
            .iter()
            .map(ToString::to_string)
            .chain(self.constraints.iter().map(ToString::to_string))
            .collect();
        write!(f, " :- {}", parts.join(", "))
    }
}

/// The intensional database: a multimap from head name to its rules.
///
/// Several rules with the same head name have union semantics. Iteration is
/// ordered by name, then by insertion order within a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<String, Vec<Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: Rule) {
        self.rules
            .entry(rule.head.name.clone())
            .or_default()
            .push(rule);
    }

    /// Rules whose head is `name`; empty if there are none
    pub fn rules_for(&self, name: &str) -> &[Rule] {
        self.rules.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Distinct head names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().flatten()
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Rule> for RuleSet {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        for rule in iter {
            self.insert(rule);
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.iter() {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::free(name)
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::new(
            Predicate::new("p", vec![var("X")]),
            vec![
                Predicate::new("q", vec![var("X"), Variable::bound(1u64)]),
                Predicate::new("r", vec![var("X")]).negate(),
            ],
        )
        .with_constraint(Constraint::new(
            ConstraintOp::Less,
            var("X"),
            Variable::bound(5u64),
        ));

        assert_eq!(rule.to_string(), "p(X) :- q(X, 1), !r(X), X < 5");
    }

    #[test]
    fn test_fact_display() {
        let rule = Rule::new(Predicate::new("p", vec![Variable::bound("a")]), vec![]);
        assert_eq!(rule.to_string(), "p(\"a\")");
    }

    #[test]
    fn test_positive_variables_skip_negated_atoms() {
        let rule = Rule::new(
            Predicate::new("p", vec![var("X")]),
            vec![
                Predicate::new("q", vec![var("X")]),
                Predicate::new("r", vec![var("Y")]).negate(),
            ],
        );
        let vars = rule.positive_variables();
        assert!(vars.contains("X"));
        assert!(!vars.contains("Y"));
    }

    #[test]
    fn test_constraint_holds() {
        let binding: HashMap<String, usize> = [("X".to_string(), 0), ("Y".to_string(), 1)]
            .into_iter()
            .collect();
        let row = vec![Value::from(2u64), Value::from(3u64)];

        let lt = Constraint::new(ConstraintOp::Less, var("X"), var("Y"));
        let ge = Constraint::new(ConstraintOp::GreaterOrEqual, var("X"), var("Y"));
        let le_const = Constraint::new(ConstraintOp::LessOrEqual, var("Y"), Variable::bound(3u64));
        let gt_const = Constraint::new(ConstraintOp::Greater, Variable::bound(3u64), var("X"));

        assert!(lt.holds(&binding, &row).unwrap());
        assert!(!ge.holds(&binding, &row).unwrap());
        assert!(le_const.holds(&binding, &row).unwrap());
        assert!(gt_const.holds(&binding, &row).unwrap());
    }

    #[test]
    fn test_constraint_type_mismatch() {
        let binding: HashMap<String, usize> = [("X".to_string(), 0)].into_iter().collect();
        let row = vec![Value::from("a")];
        let c = Constraint::new(ConstraintOp::Less, var("X"), Variable::bound(1u64));
        assert!(matches!(
            c.holds(&binding, &row),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_rule_set_multimap() {
        let mut set = RuleSet::new();
        set.insert(Rule::new(
            Predicate::new("tc", vec![var("X"), var("Y")]),
            vec![Predicate::new("edge", vec![var("X"), var("Y")])],
        ));
        set.insert(Rule::new(
            Predicate::new("tc", vec![var("X"), var("Y")]),
            vec![
                Predicate::new("edge", vec![var("X"), var("Z")]),
                Predicate::new("tc", vec![var("Z"), var("Y")]),
            ],
        ));
        set.insert(Rule::new(
            Predicate::new("a", vec![var("X")]),
            vec![Predicate::new("tc", vec![var("X"), var("X")])],
        ));

        assert_eq!(set.len(), 3);
        assert_eq!(set.rules_for("tc").len(), 2);
        assert!(set.rules_for("missing").is_empty());
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["a", "tc"]);
    }

    #[test]
    fn test_rule_serde() {
        let json = r#"{
            "head": {"name": "p", "variables": [{"var": "X"}]},
            "body": [
                {"name": "q", "variables": [{"var": "X"}]},
                {"name": "r", "variables": [{"var": "X"}], "negated": true}
            ],
            "constraints": [{"op": "<", "operand1": {"var": "X"}, "operand2": {"val": 10}}]
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.to_string(), "p(X) :- q(X), !r(X), X < 10");
    }
}
