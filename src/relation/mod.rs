//! # Relation Store
//!
//! A relation is a duplicate-free set of fixed-width rows. The [`Relation`]
//! trait is the seam every evaluation stage works against; [`VecRelation`] is
//! the in-memory implementation.
//!
//! ## Lookup
//!
//! [`Relation::equal_range`] takes a binding pattern, one [`Variable`] per
//! column:
//!
//! - bound positions select rows holding that value (per-column hash index,
//!   intersected across positions),
//! - free positions match anything, except that positions sharing a free
//!   variable name must hold equal values (`p(X, X)` is a self-join),
//! - an all-free pattern without repeats yields every row.
//!
//! ## Index maintenance
//!
//! Column indexes are built lazily on the first lookup, kept up to date by
//! `insert`, and dropped by any `reject` that removes a row. The next lookup
//! rebuilds them.

use crate::error::{EvalError, EvalResult};
use crate::hash_index::HashIndex;
use crate::value::{display_cmp_rows, Row, Value, Variable};
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Rows produced by a lookup, borrowed from the relation
pub type Matches<'a> = Box<dyn Iterator<Item = &'a Row> + 'a>;

/// Ordered, duplicate-free set of rows of a fixed arity.
pub trait Relation: fmt::Debug {
    /// Number of columns
    fn arity(&self) -> usize;

    /// Number of rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows, in insertion order
    fn iter(&self) -> Matches<'_>;

    /// Rows matching a binding pattern (see module docs)
    fn equal_range(&self, pattern: &[Variable]) -> Matches<'_>;

    /// Whether exactly this row is present
    fn includes(&self, row: &[Value]) -> bool;

    /// Add a row. Returns `false` if it was already present.
    fn insert(&mut self, row: Row) -> bool;

    /// Add every row of `other`. Returns `true` if any row was new.
    fn insert_all(&mut self, other: &dyn Relation) -> bool {
        let mut changed = false;
        for row in other.iter() {
            changed |= self.insert(row.clone());
        }
        changed
    }

    /// Remove every row for which `predicate` holds. Returns the number removed.
    fn reject(&mut self, predicate: &mut dyn FnMut(&Row) -> bool) -> usize;
}

/// In-memory relation: a row vector plus a full-row hash set for membership
/// and lazily built per-column indexes for lookups.
#[derive(Debug, Clone)]
pub struct VecRelation {
    arity: usize,
    rows: Vec<Row>,
    members: HashSet<Row>,
    index: OnceCell<HashIndex>,
}

impl VecRelation {
    pub fn new(arity: usize) -> Self {
        VecRelation {
            arity,
            rows: Vec::new(),
            members: HashSet::new(),
            index: OnceCell::new(),
        }
    }

    /// Build from rows, dropping duplicates.
    ///
    /// Fails if any row's width differs from `arity`.
    pub fn from_rows(arity: usize, rows: impl IntoIterator<Item = Row>) -> EvalResult<Self> {
        let mut relation = VecRelation::new(arity);
        for row in rows {
            relation.try_insert(row)?;
        }
        Ok(relation)
    }

    /// Insert after checking the row width
    pub fn try_insert(&mut self, row: Row) -> EvalResult<bool> {
        if row.len() != self.arity {
            return Err(EvalError::ArityMismatch {
                relation: format!("({})", display_row(&row)),
                expected: self.arity,
                found: row.len(),
            });
        }
        Ok(self.insert(row))
    }

    /// Rows sorted in presentation order, for stable output and comparisons
    pub fn sorted_rows(&self) -> Vec<Row> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| display_cmp_rows(a, b));
        rows
    }

    /// Whether the per-column indexes are currently built
    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    fn index(&self) -> &HashIndex {
        self.index
            .get_or_init(|| HashIndex::build(self.arity, self.rows.iter()))
    }

    /// Row ids matching the bound positions of `pattern`, or `None` if no
    /// position is bound
    fn bound_matches(&self, pattern: &[Variable]) -> Option<Vec<usize>> {
        let keys: Vec<(usize, &Value)> = pattern
            .iter()
            .enumerate()
            .filter_map(|(col, var)| var.instantiation().map(|value| (col, value)))
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(self.index().lookup(&keys))
        }
    }
}

fn display_row(row: &[Value]) -> String {
    row.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Groups of columns that share a free variable name, for every name that
/// occurs more than once
fn repeated_columns(pattern: &[Variable]) -> Vec<Vec<usize>> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (col, var) in pattern.iter().enumerate() {
        if let Some(name) = var.name() {
            by_name.entry(name).or_default().push(col);
        }
    }
    let mut groups: Vec<Vec<usize>> = by_name.into_values().filter(|c| c.len() > 1).collect();
    groups.sort();
    groups
}

fn columns_agree(row: &Row, groups: &[Vec<usize>]) -> bool {
    groups.iter().all(|cols| {
        let first = &row[cols[0]];
        cols[1..].iter().all(|c| &row[*c] == first)
    })
}

impl Relation for VecRelation {
    fn arity(&self) -> usize {
        self.arity
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn iter(&self) -> Matches<'_> {
        Box::new(self.rows.iter())
    }

    fn equal_range(&self, pattern: &[Variable]) -> Matches<'_> {
        if self.rows.is_empty() || pattern.len() != self.arity {
            return Box::new(std::iter::empty());
        }

        let groups = repeated_columns(pattern);
        match self.bound_matches(pattern) {
            Some(ids) => Box::new(
                ids.into_iter()
                    .map(move |id| &self.rows[id])
                    .filter(move |row| columns_agree(row, &groups)),
            ),
            None if groups.is_empty() => Box::new(self.rows.iter()),
            None => Box::new(
                self.rows
                    .iter()
                    .filter(move |row| columns_agree(row, &groups)),
            ),
        }
    }

    fn includes(&self, row: &[Value]) -> bool {
        self.members.contains(row)
    }

    fn insert(&mut self, row: Row) -> bool {
        debug_assert_eq!(row.len(), self.arity, "row arity mismatch");

        if self.members.contains(&row) {
            return false;
        }
        let row_id = self.rows.len();
        if let Some(index) = self.index.get_mut() {
            index.insert(row_id, &row);
        }
        self.members.insert(row.clone());
        self.rows.push(row);
        true
    }

    fn reject(&mut self, predicate: &mut dyn FnMut(&Row) -> bool) -> usize {
        let before = self.rows.len();
        let members = &mut self.members;
        self.rows.retain(|row| {
            if predicate(row) {
                members.remove(row);
                false
            } else {
                true
            }
        });

        let removed = before - self.rows.len();
        if removed > 0 {
            // Row ids shifted; rebuild on next lookup.
            self.index.take();
        }
        removed
    }
}

/// Set equality: same arity and the same rows, in any order
impl PartialEq for VecRelation {
    fn eq(&self, other: &Self) -> bool {
        self.arity == other.arity
            && self.rows.len() == other.rows.len()
            && self.rows.iter().all(|row| other.members.contains(row))
    }
}

impl Eq for VecRelation {}

/// Renders the relation as an ASCII table, rows in insertion order.
impl fmt::Display for VecRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "empty");
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        let mut widths = vec![0usize; self.arity];
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| format!("+{}", "-".repeat(w + 2)))
            .collect::<String>()
            + "+";

        writeln!(f, "{rule}")?;
        for row in &cells {
            for (cell, &width) in row.iter().zip(&widths) {
                write!(f, "| {cell:>width$} ")?;
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "{rule}")
    }
}
