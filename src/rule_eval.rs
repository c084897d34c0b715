//! Single-rule evaluation.
//!
//! Given one rule and a concrete relation for every body atom (aligned with
//! the body), computes the rows the rule derives:
//!
//! 1. join the positive atoms left to right,
//! 2. drop intermediate rows for which a negated atom holds,
//! 3. drop intermediate rows failing a constraint,
//! 4. project the survivors onto the head.
//!
//! Rules are assumed safe (see [`crate::safety`]); a variable that cannot be
//! located in the joined columns is reported as `UnsafeRule` rather than
//! silently ignored.

use crate::ast::{Predicate, Rule};
use crate::error::{EvalError, EvalResult};
use crate::join::join;
use crate::relation::{Relation, VecRelation};
use crate::value::{Row, Value, Variable};
use std::collections::HashMap;

/// Where a column of a derived row comes from
#[derive(Debug, Clone)]
enum Source {
    Constant(Value),
    Column(usize),
}

fn resolve(
    vars: &[Variable],
    common: &HashMap<String, usize>,
    rule: &Rule,
) -> EvalResult<Vec<Source>> {
    vars.iter()
        .map(|var| match var {
            Variable::Bound(value) => Ok(Source::Constant(value.clone())),
            Variable::Free(name) => common
                .get(name)
                .map(|col| Source::Column(*col))
                .ok_or_else(|| EvalError::UnsafeRule {
                    rule: rule.to_string(),
                    variables: vec![name.clone()],
                }),
        })
        .collect()
}

fn instantiate(sources: &[Source], row: &Row) -> Row {
    sources
        .iter()
        .map(|source| match source {
            Source::Constant(value) => value.clone(),
            Source::Column(col) => row[*col].clone(),
        })
        .collect()
}

/// Join all positive atoms. Returns the intermediate relation and the
/// binding vector describing its columns.
fn join_positive(
    rule: &Rule,
    relations: &[&dyn Relation],
) -> (VecRelation, Vec<Variable>) {
    let mut positives = rule
        .body
        .iter()
        .zip(relations)
        .filter(|(atom, _)| !atom.negated);

    let Some((first, first_rel)) = positives.next() else {
        // No positive atom: the single empty binding.
        let mut unit = VecRelation::new(0);
        unit.insert(Vec::new());
        return (unit, Vec::new());
    };

    let mut binding = first.variables.clone();
    let mut acc: Option<VecRelation> = None;

    for (atom, rel) in positives {
        let joined = match &acc {
            None => join(&binding, *first_rel, &atom.variables, *rel),
            Some(current) => join(&binding, current, &atom.variables, *rel),
        };
        binding.extend(atom.variables.iter().cloned());
        acc = Some(joined);
    }

    let intermediate = acc.unwrap_or_else(|| {
        let mut only = VecRelation::new(first_rel.arity());
        for row in first_rel.equal_range(&first.variables) {
            only.insert(row.clone());
        }
        only
    });
    (intermediate, binding)
}

/// Column of the first occurrence of each free variable
fn column_map(binding: &[Variable]) -> HashMap<String, usize> {
    let mut common = HashMap::new();
    for (col, var) in binding.iter().enumerate() {
        if let Some(name) = var.name() {
            common.entry(name.to_string()).or_insert(col);
        }
    }
    common
}

fn apply_negation(
    rule: &Rule,
    atom: &Predicate,
    relation: &dyn Relation,
    common: &HashMap<String, usize>,
    intermediate: &mut VecRelation,
) -> EvalResult<()> {
    let sources = resolve(&atom.variables, common, rule)?;
    intermediate.reject(&mut |row| relation.includes(&instantiate(&sources, row)));
    Ok(())
}

/// Evaluate one rule against the relations of its body atoms.
///
/// `relations[i]` is the relation for `rule.body[i]`. The result has the
/// head's arity and holds each derived row once.
pub fn eval_rule(rule: &Rule, relations: &[&dyn Relation]) -> EvalResult<VecRelation> {
    let head_arity = rule.head.arity();
    if relations.len() != rule.body.len() {
        return Err(EvalError::ArityMismatch {
            relation: rule.to_string(),
            expected: rule.body.len(),
            found: relations.len(),
        });
    }
    if rule.body.is_empty() {
        return Ok(VecRelation::new(head_arity));
    }

    let (mut intermediate, binding) = join_positive(rule, relations);
    let common = column_map(&binding);

    for (atom, relation) in rule.body.iter().zip(relations) {
        if intermediate.is_empty() {
            break;
        }
        if atom.negated {
            apply_negation(rule, atom, *relation, &common, &mut intermediate)?;
        }
    }

    for constraint in &rule.constraints {
        if intermediate.is_empty() {
            break;
        }
        // Check operand placement up front so the filter only fails on types.
        for operand in constraint.operands() {
            if let Variable::Free(name) = operand {
                if !common.contains_key(name) {
                    return Err(EvalError::UnsafeRule {
                        rule: rule.to_string(),
                        variables: vec![name.clone()],
                    });
                }
            }
        }

        let mut failure: Option<EvalError> = None;
        intermediate.reject(&mut |row| match constraint.holds(&common, row) {
            Ok(holds) => !holds,
            Err(err) => {
                failure.get_or_insert(err);
                false
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
    }

    let head = resolve(&rule.head.variables, &common, rule)?;
    let mut result = VecRelation::new(head_arity);
    for row in intermediate.iter() {
        result.insert(instantiate(&head, row));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, RuleBuilder};

    fn unary(values: &[u64]) -> VecRelation {
        VecRelation::from_rows(1, values.iter().map(|v| vec![Value::from(*v)])).unwrap()
    }

    fn binary(pairs: &[(u64, u64)]) -> VecRelation {
        VecRelation::from_rows(
            2,
            pairs
                .iter()
                .map(|(a, b)| vec![Value::from(*a), Value::from(*b)]),
        )
        .unwrap()
    }

    #[test]
    fn test_negation_as_failure() {
        // p(X) :- q(X), !r(X).
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .body_atom("q", ["X"])
            .negated_atom("r", ["X"])
            .build();
        let q = unary(&[1, 2, 3]);
        let r = unary(&[2]);

        let result = eval_rule(&rule, &[&q, &r]).unwrap();
        assert_eq!(result, unary(&[1, 3]));
    }

    #[test]
    fn test_negation_before_positive_atom() {
        // p(X) :- !r(X), q(X).
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .negated_atom("r", ["X"])
            .body_atom("q", ["X"])
            .build();
        let r = unary(&[2]);
        let q = unary(&[1, 2, 3]);

        let result = eval_rule(&rule, &[&r, &q]).unwrap();
        assert_eq!(result, unary(&[1, 3]));
    }

    #[test]
    fn test_join_and_project() {
        // path2(X, Z) :- edge(X, Y), edge(Y, Z).
        let rule = RuleBuilder::new("path2")
            .head_vars(["X", "Z"])
            .body_atom("edge", ["X", "Y"])
            .body_atom("edge", ["Y", "Z"])
            .build();
        let edge = binary(&[(1, 2), (2, 3), (3, 4)]);

        let result = eval_rule(&rule, &[&edge, &edge]).unwrap();
        assert_eq!(result, binary(&[(1, 3), (2, 4)]));
    }

    #[test]
    fn test_three_way_join() {
        // p(A, D) :- e(A, B), e(B, C), e(C, D).
        let rule = RuleBuilder::new("p")
            .head_vars(["A", "D"])
            .body_atom("e", ["A", "B"])
            .body_atom("e", ["B", "C"])
            .body_atom("e", ["C", "D"])
            .build();
        let e = binary(&[(1, 2), (2, 3), (3, 4), (4, 5)]);

        let result = eval_rule(&rule, &[&e, &e, &e]).unwrap();
        assert_eq!(result, binary(&[(1, 4), (2, 5)]));
    }

    #[test]
    fn test_non_adjacent_positive_atoms() {
        // p(X, Y) :- a(X), !n(X), b(X, Y).
        let rule = RuleBuilder::new("p")
            .head_vars(["X", "Y"])
            .body_atom("a", ["X"])
            .negated_atom("n", ["X"])
            .body_atom("b", ["X", "Y"])
            .build();
        let a = unary(&[1, 2]);
        let n = unary(&[2]);
        let b = binary(&[(1, 10), (2, 20)]);

        let result = eval_rule(&rule, &[&a, &n, &b]).unwrap();
        assert_eq!(result, binary(&[(1, 10)]));
    }

    #[test]
    fn test_constraints_filter_rows() {
        // big(X, Y) :- edge(X, Y), X < Y, Y >= 3.
        let rule = RuleBuilder::new("big")
            .head_vars(["X", "Y"])
            .body_atom("edge", ["X", "Y"])
            .compare(crate::ast::ConstraintOp::Less, "X", "Y")
            .greater_eq("Y", 3u64)
            .build();
        let edge = binary(&[(1, 2), (2, 3), (5, 4), (3, 7)]);

        let result = eval_rule(&rule, &[&edge]).unwrap();
        assert_eq!(result, binary(&[(2, 3), (3, 7)]));
    }

    #[test]
    fn test_constraint_type_mismatch_is_an_error() {
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .body_atom("q", ["X"])
            .less("X", "zzz")
            .build();
        let q = unary(&[1]);
        assert!(matches!(
            eval_rule(&rule, &[&q]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_constants_in_body_and_head() {
        // tagged(1, Y) :- edge(2, Y).
        let rule = RuleBuilder::new("tagged")
            .head_val(1u64)
            .head_vars(["Y"])
            .body(atom("edge").val(2u64).var("Y").build())
            .build();
        let edge = binary(&[(1, 5), (2, 6), (2, 7)]);

        let result = eval_rule(&rule, &[&edge]).unwrap();
        assert_eq!(result, binary(&[(1, 6), (1, 7)]));
    }

    #[test]
    fn test_repeated_variable_in_single_atom() {
        // loop(X) :- edge(X, X).
        let rule = RuleBuilder::new("loop")
            .head_vars(["X"])
            .body_atom("edge", ["X", "X"])
            .build();
        let edge = binary(&[(1, 1), (1, 2), (2, 2)]);

        let result = eval_rule(&rule, &[&edge]).unwrap();
        assert_eq!(result, unary(&[1, 2]));
    }

    #[test]
    fn test_empty_body_yields_nothing() {
        let rule = RuleBuilder::new("p").head_val(1u64).build();
        let result = eval_rule(&rule, &[]).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.arity(), 1);
    }

    #[test]
    fn test_only_negated_ground_atoms() {
        // ok(1) :- !broken(1).
        let rule = RuleBuilder::new("ok")
            .head_val(1u64)
            .body(atom("broken").val(1u64).negated().build())
            .build();

        let healthy = VecRelation::new(1);
        assert_eq!(eval_rule(&rule, &[&healthy]).unwrap(), unary(&[1]));

        let broken = unary(&[1]);
        assert!(eval_rule(&rule, &[&broken]).unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_head_variable_is_reported() {
        let rule = RuleBuilder::new("p")
            .head_vars(["X", "Y"])
            .body_atom("q", ["X"])
            .build();
        let q = unary(&[1]);
        assert!(matches!(
            eval_rule(&rule, &[&q]),
            Err(EvalError::UnsafeRule { .. })
        ));
    }

    #[test]
    fn test_relation_count_must_match_body() {
        let rule = RuleBuilder::new("p")
            .head_vars(["X"])
            .body_atom("q", ["X"])
            .build();
        assert!(matches!(
            eval_rule(&rule, &[]),
            Err(EvalError::ArityMismatch { .. })
        ));
    }
}
