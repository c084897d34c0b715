//! Safety checking for rules
//!
//! A rule is safe if every variable occurring in
//! 1. the head,
//! 2. a negated body atom,
//! 3. a constraint
//!
//! is either a constant or also occurs in some positive body atom. Safe rules
//! derive finite relations; unsafe ones would range over an unbounded domain
//! (`p(X) :- !q(X)` holds for every X not in q).
//!
//! Unsafe rules are rejected before evaluation, never evaluated to an empty
//! or a "everything" result.

use crate::ast::{Rule, RuleSet};
use crate::error::{EvalError, EvalResult};
use crate::value::Variable;
use std::collections::BTreeSet;

/// Free variables that a safe rule would need to bind positively but this
/// rule does not, sorted and deduplicated
pub fn unsafe_variables(rule: &Rule) -> Vec<String> {
    let positive = rule.positive_variables();
    let mut offending: BTreeSet<&str> = BTreeSet::new();

    let checked = rule
        .head
        .variables
        .iter()
        .chain(rule.negated_atoms().flat_map(|atom| atom.variables.iter()))
        .chain(rule.constraints.iter().flat_map(|c| c.operands()));
    for name in checked.filter_map(Variable::name) {
        if !positive.contains(name) {
            offending.insert(name);
        }
    }

    offending.into_iter().map(str::to_string).collect()
}

/// Whether every head, negated and constrained variable is bound positively
pub fn is_safe(rule: &Rule) -> bool {
    unsafe_variables(rule).is_empty()
}

/// Check a single rule, naming the offending variables on failure
pub fn check_rule_safety(rule: &Rule) -> EvalResult<()> {
    let variables = unsafe_variables(rule);
    if variables.is_empty() {
        Ok(())
    } else {
        Err(EvalError::UnsafeRule {
            rule: rule.to_string(),
            variables,
        })
    }
}

/// Check every rule of a rule set; the first unsafe rule (in rule-set order)
/// is reported
pub fn check_program_safety(rules: &RuleSet) -> EvalResult<()> {
    rules.iter().try_for_each(check_rule_safety)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, RuleBuilder};

    #[test]
    fn test_safe_rule() {
        // tc(X, Y) :- edge(X, Z), tc(Z, Y).
        let rule = RuleBuilder::new("tc")
            .head_vars(["X", "Y"])
            .body_atom("edge", ["X", "Z"])
            .body_atom("tc", ["Z", "Y"])
            .build();
        assert!(is_safe(&rule));
        assert!(check_rule_safety(&rule).is_ok());
    }

    #[test]
    fn test_variable_only_in_negation_is_unsafe() {
        // p(X) :- !q(X).
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .negated_atom("q", ["X"])
            .build();
        assert!(!is_safe(&rule));

        let err = check_rule_safety(&rule).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnsafeRule {
                rule: "p(X) :- !q(X)".to_string(),
                variables: vec!["X".to_string()],
            }
        );
    }

    #[test]
    fn test_negated_variable_not_in_head_is_unsafe() {
        // p(X) :- q(X), !r(X, Y).
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .body_atom("q", ["X"])
            .negated_atom("r", ["X", "Y"])
            .build();
        assert_eq!(unsafe_variables(&rule), vec!["Y".to_string()]);
    }

    #[test]
    fn test_head_variable_missing_from_body_is_unsafe() {
        let rule = RuleBuilder::new("p")
            .head_vars(["X", "Y"])
            .body_atom("q", ["X"])
            .build();
        assert_eq!(unsafe_variables(&rule), vec!["Y".to_string()]);
    }

    #[test]
    fn test_constraint_variable_must_be_bound() {
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .body_atom("q", ["X"])
            .less("Z", 3u64)
            .build();
        assert_eq!(unsafe_variables(&rule), vec!["Z".to_string()]);
    }

    #[test]
    fn test_offending_variables_sorted_across_positions() {
        // p(X, W) :- q(X), !r(V), Z < X.
        let rule = RuleBuilder::new("p")
            .head_vars(["X", "W"])
            .body_atom("q", ["X"])
            .negated_atom("r", ["V"])
            .compare(crate::ast::ConstraintOp::Less, "Z", "X")
            .build();
        assert_eq!(unsafe_variables(&rule), vec!["V", "W", "Z"]);
    }

    #[test]
    fn test_constants_are_always_safe() {
        // p(1) :- !q(2).
        let rule = RuleBuilder::new("p")
            .head_val(1u64)
            .body(atom("q").val(2u64).negated().build())
            .build();
        assert!(is_safe(&rule));
    }

    #[test]
    fn test_program_safety_reports_first_unsafe_rule() {
        let rules: RuleSet = vec![
            RuleBuilder::new("a")
                .head_vars(["X"])
                .body_atom("e", ["X"])
                .build(),
            RuleBuilder::new("b")
                .head_vars(["X"])
                .negated_atom("e", ["X"])
                .build(),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            check_program_safety(&rules),
            Err(EvalError::UnsafeRule { rule, .. }) if rule == "b(X) :- !e(X)"
        ));
    }
}
