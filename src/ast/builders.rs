//! Builder Patterns for Rule Construction
//!
//! Fluent APIs for building predicates and rules, mostly used by tests and
//! by callers that derive rules from their own data. Builders produce exactly
//! the plain [`Predicate`], [`Rule`] and [`Constraint`] values; they add no
//! semantics.
//!
//! ## Example
//!
//! ```rust
//! use stratalog::ast::builders::{atom, RuleBuilder};
//!
//! // tc(X, Y) :- edge(X, Z), tc(Z, Y).
//! let rule = RuleBuilder::new("tc")
//!     .head_vars(["X", "Y"])
//!     .body_atom("edge", ["X", "Z"])
//!     .body_atom("tc", ["Z", "Y"])
//!     .build();
//! assert_eq!(rule.to_string(), "tc(X, Y) :- edge(X, Z), tc(Z, Y)");
//!
//! // p(X) :- q(X, 1), !r(X), X < 10.
//! let rule = RuleBuilder::new("p")
//!     .head_vars(["X"])
//!     .body(atom("q").var("X").val(1u64).build())
//!     .negated_atom("r", ["X"])
//!     .less("X", 10u64)
//!     .build();
//! assert_eq!(rule.to_string(), "p(X) :- q(X, 1), !r(X), X < 10");
//! ```

use super::{Constraint, ConstraintOp, Predicate, Rule};
use crate::value::{Value, Variable};

/// Start building a predicate named `name`
pub fn atom(name: &str) -> PredicateBuilder {
    PredicateBuilder::new(name)
}

/// Builder for constructing Predicate instances
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    name: String,
    variables: Vec<Variable>,
    negated: bool,
}

impl PredicateBuilder {
    pub fn new(name: &str) -> Self {
        PredicateBuilder {
            name: name.to_string(),
            variables: Vec::new(),
            negated: false,
        }
    }

    /// Append a free variable argument
    pub fn var(mut self, name: &str) -> Self {
        self.variables.push(Variable::free(name));
        self
    }

    /// Append a constant argument
    pub fn val(mut self, value: impl Into<Value>) -> Self {
        self.variables.push(Variable::bound(value));
        self
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn build(self) -> Predicate {
        Predicate {
            name: self.name,
            variables: self.variables,
            negated: self.negated,
        }
    }
}

/// Builder for constructing Rule instances
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    head: PredicateBuilder,
    body: Vec<Predicate>,
    constraints: Vec<Constraint>,
}

impl RuleBuilder {
    pub fn new(head_name: &str) -> Self {
        RuleBuilder {
            head: PredicateBuilder::new(head_name),
            body: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Append free variables to the head
    pub fn head_vars<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.head = self.head.var(name);
        }
        self
    }

    /// Append a constant to the head
    pub fn head_val(mut self, value: impl Into<Value>) -> Self {
        self.head = self.head.val(value);
        self
    }

    /// Append a positive body atom whose arguments are all free variables
    pub fn body_atom<'a>(mut self, name: &str, vars: impl IntoIterator<Item = &'a str>) -> Self {
        self.body.push(Predicate::new(
            name,
            vars.into_iter().map(Variable::free).collect(),
        ));
        self
    }

    /// Append a negated body atom whose arguments are all free variables
    pub fn negated_atom<'a>(mut self, name: &str, vars: impl IntoIterator<Item = &'a str>) -> Self {
        self.body.push(
            Predicate::new(name, vars.into_iter().map(Variable::free).collect()).negate(),
        );
        self
    }

    /// Append an arbitrary body atom
    pub fn body(mut self, predicate: Predicate) -> Self {
        self.body.push(predicate);
        self
    }

    /// Append a constraint between two variables
    pub fn compare(mut self, op: ConstraintOp, left: &str, right: &str) -> Self {
        self.constraints.push(Constraint::new(
            op,
            Variable::free(left),
            Variable::free(right),
        ));
        self
    }

    /// `var < value`
    pub fn less(self, var: &str, value: impl Into<Value>) -> Self {
        self.constant(ConstraintOp::Less, var, value)
    }

    /// `var <= value`
    pub fn less_eq(self, var: &str, value: impl Into<Value>) -> Self {
        self.constant(ConstraintOp::LessOrEqual, var, value)
    }

    /// `var > value`
    pub fn greater(self, var: &str, value: impl Into<Value>) -> Self {
        self.constant(ConstraintOp::Greater, var, value)
    }

    /// `var >= value`
    pub fn greater_eq(self, var: &str, value: impl Into<Value>) -> Self {
        self.constant(ConstraintOp::GreaterOrEqual, var, value)
    }

    fn constant(mut self, op: ConstraintOp, var: &str, value: impl Into<Value>) -> Self {
        self.constraints.push(Constraint::new(
            op,
            Variable::free(var),
            Variable::bound(value),
        ));
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            head: self.head.build(),
            body: self.body,
            constraints: self.constraints,
        }
    }
}
