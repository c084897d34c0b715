//! Nested-loop index join.
//!
//! The outer relation drives; for each of its rows the inner relation is
//! probed through [`Relation::equal_range`] with the shared variables bound to
//! the outer row's values. Output rows are the outer row followed by the inner
//! row. Shared columns are kept twice; projection happens at the rule head.

use crate::relation::{Relation, VecRelation};
use crate::value::{Row, Variable};

/// Column pairs `(outer, inner)` whose free variables share a name
pub fn shared_columns(outer: &[Variable], inner: &[Variable]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, a) in outer.iter().enumerate() {
        let Some(name) = a.name() else { continue };
        for (j, b) in inner.iter().enumerate() {
            if b.name() == Some(name) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Natural join of `outer` and `inner` on their shared free-variable names.
///
/// `outer_bindings` and `inner_bindings` describe the columns of each side;
/// bound entries also restrict their own side.
pub fn join(
    outer_bindings: &[Variable],
    outer: &dyn Relation,
    inner_bindings: &[Variable],
    inner: &dyn Relation,
) -> VecRelation {
    let mut result = VecRelation::new(outer.arity() + inner.arity());
    if outer.is_empty() || inner.is_empty() {
        return result;
    }

    let shared = shared_columns(outer_bindings, inner_bindings);
    let mut probe = inner_bindings.to_vec();

    for outer_row in outer.equal_range(outer_bindings) {
        for &(i, j) in &shared {
            probe[j] = Variable::Bound(outer_row[i].clone());
        }
        for inner_row in inner.equal_range(&probe) {
            let mut row: Row = Vec::with_capacity(outer_row.len() + inner_row.len());
            row.extend_from_slice(outer_row);
            row.extend_from_slice(inner_row);
            result.insert(row);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn x(name: &str) -> Variable {
        Variable::free(name)
    }

    fn rel(arity: usize, rows: Vec<Row>) -> VecRelation {
        VecRelation::from_rows(arity, rows).unwrap()
    }

    #[test]
    fn test_join_on_shared_variable() {
        // A(id, label) ⋈ B(id, val)
        let a = rel(
            2,
            vec![
                vec![Value::from(1u64), Value::from("x")],
                vec![Value::from(2u64), Value::from("y")],
            ],
        );
        let b = rel(
            2,
            vec![
                vec![Value::from(1u64), Value::from("p")],
                vec![Value::from(2u64), Value::from("q")],
                vec![Value::from(3u64), Value::from("r")],
            ],
        );

        let joined = join(&[x("Id"), x("L")], &a, &[x("Id"), x("V")], &b);

        let expected = rel(
            4,
            vec![
                vec![Value::from(1u64), Value::from("x"), Value::from(1u64), Value::from("p")],
                vec![Value::from(2u64), Value::from("y"), Value::from(2u64), Value::from("q")],
            ],
        );
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_join_without_shared_variables_is_cross_product() {
        let a = rel(1, vec![vec![Value::from(1u64)], vec![Value::from(2u64)]]);
        let b = rel(1, vec![vec![Value::from(7u64)], vec![Value::from(8u64)]]);
        let joined = join(&[x("A")], &a, &[x("B")], &b);
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.arity(), 2);
    }

    #[test]
    fn test_join_respects_inner_constants() {
        let a = rel(1, vec![vec![Value::from(1u64)], vec![Value::from(2u64)]]);
        let b = rel(
            2,
            vec![
                vec![Value::from(1u64), Value::from(5u64)],
                vec![Value::from(2u64), Value::from(6u64)],
            ],
        );
        let joined = join(&[x("A")], &a, &[x("A"), Variable::bound(6u64)], &b);
        assert_eq!(
            joined.sorted_rows(),
            vec![vec![Value::from(2u64), Value::from(2u64), Value::from(6u64)]]
        );
    }

    #[test]
    fn test_join_with_empty_side() {
        let a = rel(1, vec![vec![Value::from(1u64)]]);
        let b = VecRelation::new(1);
        assert!(join(&[x("A")], &a, &[x("A")], &b).is_empty());
        assert!(join(&[x("A")], &b, &[x("A")], &a).is_empty());
    }

    #[test]
    fn test_shared_columns() {
        let pairs = shared_columns(
            &[x("A"), Variable::bound(1u64), x("B")],
            &[x("B"), x("C"), x("A")],
        );
        assert_eq!(pairs, vec![(0, 2), (2, 0)]);
    }
}
