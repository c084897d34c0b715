//! Hash-based column indexing for relations. O(1) lookup of the rows holding
//! a given value in a given column, and intersection across columns for
//! multi-column patterns.
//!
//! # Architecture
//!
//! ```text
//! HashIndex
//!   `-- Vec<ColumnIndex>              (one per column)
//!         `-- HashMap<Value, Vec<usize>>  (value -> ascending row ids)
//! ```
//!
//! Row ids are positions in the owning relation's row vector. They are
//! appended in ascending order, so every posting list stays sorted and
//! intersections are linear merges.
//!
//! # Example
//!
//! ```
//! use stratalog::hash_index::HashIndex;
//! use stratalog::value::Value;
//!
//! let rows = vec![
//!     vec![Value::from(1u64), Value::from(2u64)],
//!     vec![Value::from(1u64), Value::from(3u64)],
//!     vec![Value::from(2u64), Value::from(3u64)],
//! ];
//! let index = HashIndex::build(2, rows.iter());
//!
//! assert_eq!(index.probe(0, &Value::from(1u64)), &[0, 1]);
//! let one = Value::from(1u64);
//! let three = Value::from(3u64);
//! assert_eq!(index.lookup(&[(0, &one), (1, &three)]), vec![1]);
//! ```

use crate::value::{Row, Value};
use std::collections::HashMap;

/// Index over a single column.
#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    postings: HashMap<Value, Vec<usize>>,
}

impl ColumnIndex {
    pub fn insert(&mut self, value: &Value, row_id: usize) {
        self.postings.entry(value.clone()).or_default().push(row_id);
    }

    /// Row ids holding `value`, ascending
    pub fn probe(&self, value: &Value) -> &[usize] {
        self.postings.get(value).map_or(&[], Vec::as_slice)
    }
}

/// Per-column indexes for one relation.
#[derive(Clone, Debug, Default)]
pub struct HashIndex {
    columns: Vec<ColumnIndex>,
}

impl HashIndex {
    pub fn new(arity: usize) -> Self {
        HashIndex {
            columns: vec![ColumnIndex::default(); arity],
        }
    }

    /// Build from scratch over `rows`, numbering them in iteration order.
    pub fn build<'a>(arity: usize, rows: impl Iterator<Item = &'a Row>) -> Self {
        let mut index = HashIndex::new(arity);
        for (row_id, row) in rows.enumerate() {
            index.insert(row_id, row);
        }
        index
    }

    /// Register `row` under `row_id`. Ids must be handed out in ascending order.
    pub fn insert(&mut self, row_id: usize, row: &Row) {
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.insert(value, row_id);
        }
    }

    /// Row ids holding `value` in column `col`, ascending
    pub fn probe(&self, col: usize, value: &Value) -> &[usize] {
        self.columns.get(col).map_or(&[], |c| c.probe(value))
    }

    /// Row ids matching every `(column, value)` key, ascending.
    ///
    /// The caller handles the no-key case; an empty `keys` yields no rows.
    pub fn lookup(&self, keys: &[(usize, &Value)]) -> Vec<usize> {
        let mut postings: Vec<&[usize]> = keys
            .iter()
            .map(|(col, value)| self.probe(*col, value))
            .collect();
        // Smallest list first keeps every intermediate result small.
        postings.sort_by_key(|p| p.len());

        let Some((first, rest)) = postings.split_first() else {
            return Vec::new();
        };
        let mut result = first.to_vec();
        for posting in rest {
            if result.is_empty() {
                break;
            }
            result = intersect_sorted(&result, posting);
        }
        result
    }
}

/// Intersection of two ascending id lists
fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[u64]) -> Row {
        values.iter().copied().map(Value::from).collect()
    }

    #[test]
    fn test_probe_single_column() {
        let rows = [row(&[1, 10]), row(&[1, 20]), row(&[2, 30])];
        let index = HashIndex::build(2, rows.iter());

        assert_eq!(index.probe(0, &Value::from(1u64)), &[0, 1]);
        assert_eq!(index.probe(0, &Value::from(2u64)), &[2]);
        assert_eq!(index.probe(1, &Value::from(10u64)), &[0]);
        assert!(index.probe(0, &Value::from(99u64)).is_empty());
        assert!(index.probe(5, &Value::from(1u64)).is_empty());
    }

    #[test]
    fn test_lookup_intersects_columns() {
        let rows = [row(&[1, 1]), row(&[1, 2]), row(&[2, 2]), row(&[1, 2])];
        let index = HashIndex::build(2, rows.iter());

        let one = Value::from(1u64);
        let two = Value::from(2u64);
        assert_eq!(index.lookup(&[(0, &one), (1, &two)]), vec![1, 3]);
        assert_eq!(index.lookup(&[(0, &two), (1, &one)]), Vec::<usize>::new());
        assert!(index.lookup(&[]).is_empty());
    }

    #[test]
    fn test_incremental_insert() {
        let mut index = HashIndex::new(1);
        index.insert(0, &row(&[7]));
        index.insert(1, &row(&[7]));
        assert_eq!(index.probe(0, &Value::from(7u64)), &[0, 1]);
        assert!(index.probe(0, &Value::from(8u64)).is_empty());
    }

    #[test]
    fn test_intersect_sorted() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 7], &[3, 4, 7, 9]), vec![3, 7]);
        assert!(intersect_sorted(&[1, 2], &[]).is_empty());
    }
}
