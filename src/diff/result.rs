// ABOUTME: Structured comparison results, one per object kind
// ABOUTME: Tabular-ready rows plus missing names, count mismatches, and per-object failures

use crate::catalog::{ObjectKind, Sequence};
use crate::error::CatalogError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Destination => f.write_str("destination"),
        }
    }
}

/// What one side of a comparison row shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Count(i64),
    Found,
    NotFound,
    Failed,
    Blank,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Count(n) => write!(f, "{}", n),
            Cell::Found => f.write_str("FOUND"),
            Cell::NotFound => f.write_str("NOTFOUND"),
            Cell::Failed => f.write_str("FAILED"),
            Cell::Blank => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub name: String,
    pub source: Cell,
    pub destination: Cell,
    pub equal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMismatch {
    pub name: String,
    pub source: i64,
    pub destination: i64,
}

#[derive(Debug)]
pub struct ComparisonFailure {
    pub name: String,
    pub side: Side,
    pub error: CatalogError,
}

/// Outcome of comparing one object kind between source and destination
#[derive(Debug)]
pub struct DiffResult {
    pub kind: ObjectKind,
    /// Rows to render; equal rows are absent when only mismatches are shown
    pub rows: Vec<DiffRow>,
    /// Names present in source but absent in destination, in source order
    pub missing: Vec<String>,
    pub count_mismatches: Vec<CountMismatch>,
    pub failures: Vec<ComparisonFailure>,
    /// Objects examined, regardless of output filtering
    pub compared: usize,
    /// Objects found equal, regardless of output filtering
    pub equal: usize,
    show_false_only: bool,
}

impl DiffResult {
    pub fn new(kind: ObjectKind, show_false_only: bool) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            missing: Vec::new(),
            count_mismatches: Vec::new(),
            failures: Vec::new(),
            compared: 0,
            equal: 0,
            show_false_only,
        }
    }

    /// Count a row and keep it unless it is equal and filtered out
    pub fn push_row(&mut self, row: DiffRow) {
        self.compared += 1;
        if row.equal {
            self.equal += 1;
            if self.show_false_only {
                return;
            }
        }
        self.rows.push(row);
    }

    /// Record an object that exists only in source
    pub fn push_missing(&mut self, name: impl Into<String>, source: Cell) {
        let name = name.into();
        self.missing.push(name.clone());
        self.push_row(DiffRow {
            name,
            source,
            destination: Cell::NotFound,
            equal: false,
        });
    }

    /// Record a per-object failure; the object counts as unequal
    pub fn push_failure(
        &mut self,
        name: impl Into<String>,
        side: Side,
        error: CatalogError,
        source: Cell,
        destination: Cell,
    ) {
        let name = name.into();
        self.push_row(DiffRow {
            name: name.clone(),
            source,
            destination,
            equal: false,
        });
        self.failures.push(ComparisonFailure { name, side, error });
    }

    /// Record a scalar comparison of two successfully fetched counts
    pub fn push_counts(&mut self, name: impl Into<String>, source: i64, destination: i64) {
        let name = name.into();
        let equal = source == destination;
        if !equal {
            self.count_mismatches.push(CountMismatch {
                name: name.clone(),
                source,
                destination,
            });
        }
        self.push_row(DiffRow {
            name,
            source: Cell::Count(source),
            destination: Cell::Count(destination),
            equal,
        });
    }

    pub fn mismatches(&self) -> usize {
        self.compared - self.equal
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches() == 0
    }
}

/// Index comparison: a cheap total-count signal plus per-index presence
#[derive(Debug)]
pub struct IndexDiff {
    pub source_total: i64,
    pub destination_total: i64,
    pub totals_equal: bool,
    /// `(index, CREATE INDEX text)` for missing indexes whose definition could be read
    pub definitions: Vec<(String, String)>,
    pub result: DiffResult,
}

/// Sequence comparison; count equality is informational only
#[derive(Debug)]
pub struct SequenceDiff {
    pub source_count: usize,
    pub destination_count: usize,
    pub counts_equal: bool,
    /// Full records of the missing sequences, for creation on the destination
    pub missing_sequences: Vec<Sequence>,
    pub result: DiffResult,
}

/// Every comparison a `compare` run produces
#[derive(Debug)]
pub struct ComparisonReport {
    pub tables: DiffResult,
    pub indexes: IndexDiff,
    pub sequences: SequenceDiff,
    pub views: DiffResult,
    pub functions: DiffResult,
    pub statistics: DiffResult,
}

impl ComparisonReport {
    pub fn is_clean(&self) -> bool {
        self.tables.is_clean()
            && self.indexes.totals_equal
            && self.indexes.result.is_clean()
            && self.sequences.result.is_clean()
            && self.views.is_clean()
            && self.functions.is_clean()
            && self.statistics.is_clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_false_only_keeps_totals() {
        let mut result = DiffResult::new(ObjectKind::Table, true);
        result.push_counts("public.a", 3, 3);
        result.push_counts("public.b", 3, 4);
        result.push_missing("public.c", Cell::Blank);

        assert_eq!(result.compared, 3);
        assert_eq!(result.equal, 1);
        assert_eq!(result.mismatches(), 2);
        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.iter().all(|r| !r.equal));
        assert_eq!(result.missing, vec!["public.c"]);
        assert_eq!(
            result.count_mismatches,
            vec![CountMismatch {
                name: "public.b".to_string(),
                source: 3,
                destination: 4
            }]
        );
    }

    #[test]
    fn test_failure_counts_as_unequal() {
        let mut result = DiffResult::new(ObjectKind::Table, false);
        result.push_failure(
            "public.c",
            Side::Destination,
            CatalogError::Timeout {
                context: "counting rows".to_string(),
            },
            Cell::Count(10),
            Cell::Failed,
        );
        assert!(!result.is_clean());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].side, Side::Destination);
        assert_eq!(result.rows[0].destination.to_string(), "FAILED");
    }
}
