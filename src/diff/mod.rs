// ABOUTME: DiffEngine - compares two catalog snapshots object kind by object kind
// ABOUTME: Presence checks by qualified name, row counts for tables, scalar index/sequence totals

pub mod result;

pub use crate::catalog::ObjectKind;
pub use result::{
    Cell, ComparisonFailure, ComparisonReport, CountMismatch, DiffResult, DiffRow, IndexDiff,
    SequenceDiff, Side,
};

use crate::catalog::{CatalogSource, Snapshot, Table};

/// A named single-value query compared between both databases
#[derive(Debug, Clone, Copy)]
pub struct StatQuery {
    pub name: &'static str,
    pub query: &'static str,
}

/// Extra statistics compared alongside the catalog objects
///
/// Relations created by the replication agent carry `dms` in their name and
/// are excluded on both sides.
pub const STAT_QUERIES: &[StatQuery] = &[
    StatQuery {
        name: "pg_stat_user_tables",
        query: "SELECT COUNT(*) FROM pg_stat_user_tables \
                WHERE schemaname = 'public' AND relname NOT LIKE '%dms%'",
    },
    StatQuery {
        name: "pg_stat_user_indexes",
        query: "SELECT COUNT(*) FROM pg_stat_user_indexes \
                WHERE schemaname = 'public' AND relname NOT LIKE '%dms%'",
    },
    StatQuery {
        name: "pg_stat_user_functions",
        query: "SELECT COUNT(*) FROM pg_stat_user_functions \
                WHERE schemaname = 'public' AND funcname NOT LIKE '%dms%'",
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Drop equal rows from the output; totals still include them
    pub show_false_only: bool,
}

/// Compares a source snapshot against a destination snapshot
///
/// Source objects are walked in catalog order and each one is looked up in
/// the destination by qualified name. Only tables and statistics touch the
/// databases again; everything else is decided from the snapshots alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    fn result(&self, kind: ObjectKind) -> DiffResult {
        DiffResult::new(kind, self.options.show_false_only)
    }

    /// Presence and exact row count of every source table
    ///
    /// A row-count failure on either side is recorded against that table and
    /// the walk continues with the next one. `on_table` is called once per
    /// source table, before it is compared.
    pub async fn compare_tables(
        &self,
        source: &Snapshot,
        destination: &Snapshot,
        source_reader: &dyn CatalogSource,
        destination_reader: &dyn CatalogSource,
        mut on_table: impl FnMut(&Table),
    ) -> DiffResult {
        let mut result = self.result(ObjectKind::Table);

        for table in &source.tables {
            on_table(table);
            let name = table.to_string();

            if !destination.contains_table(table) {
                tracing::debug!("Table {} does not exist in destination", name);
                result.push_missing(name, Cell::Blank);
                continue;
            }

            let source_count = match source_reader.table_row_count(table).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Failed to get source row count for {}: {}", name, e);
                    result.push_failure(name, Side::Source, e, Cell::Failed, Cell::Failed);
                    continue;
                }
            };

            let destination_count = match destination_reader.table_row_count(table).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Failed to get destination row count for {}: {}", name, e);
                    result.push_failure(
                        name,
                        Side::Destination,
                        e,
                        Cell::Count(source_count),
                        Cell::Failed,
                    );
                    continue;
                }
            };

            if source_count != destination_count {
                tracing::debug!(
                    "Table {} has different row count: {} vs {}",
                    name,
                    source_count,
                    destination_count
                );
            }
            result.push_counts(name, source_count, destination_count);
        }

        tracing::info!("Tables not found in destination: {}", result.missing.len());
        result
    }

    /// Total index count, then per-index presence by index name
    ///
    /// The definition of each missing index is read from the source so the
    /// report can show what to recreate; failing to read it is only logged.
    pub async fn compare_indexes(
        &self,
        source: &Snapshot,
        destination: &Snapshot,
        source_reader: &dyn CatalogSource,
    ) -> IndexDiff {
        let mut result = self.result(ObjectKind::Index);
        let mut definitions = Vec::new();

        for index in &source.indexes {
            if destination.contains_index(&index.index) {
                result.push_row(DiffRow {
                    name: index.to_string(),
                    source: Cell::Found,
                    destination: Cell::Found,
                    equal: true,
                });
                continue;
            }

            tracing::debug!("Index {} does not exist in destination", index.index);
            match source_reader.index_definition(&index.index).await {
                Ok(definition) => {
                    tracing::debug!("Index definition: {}", definition);
                    definitions.push((index.index.clone(), definition));
                }
                Err(e) => tracing::error!("Failed to get index definition: {}", e),
            }
            result.missing.push(index.index.clone());
            result.push_row(DiffRow {
                name: index.to_string(),
                source: Cell::Found,
                destination: Cell::NotFound,
                equal: false,
            });
        }

        IndexDiff {
            source_total: source.index_count,
            destination_total: destination.index_count,
            totals_equal: source.index_count == destination.index_count,
            definitions,
            result,
        }
    }

    /// Sequence totals (informational) followed by the per-name check
    ///
    /// Equal totals say nothing about individual sequences: the destination
    /// may hold the same number of different sequences, so the per-name walk
    /// always runs.
    pub fn compare_sequences(&self, source: &Snapshot, destination: &Snapshot) -> SequenceDiff {
        let mut result = self.result(ObjectKind::Sequence);
        let mut missing_sequences = Vec::new();

        tracing::debug!(
            "Source sequences: {}, destination sequences: {}",
            source.sequences.len(),
            destination.sequences.len()
        );

        for sequence in &source.sequences {
            if destination.contains_sequence(sequence) {
                result.push_row(DiffRow {
                    name: sequence.to_string(),
                    source: Cell::Found,
                    destination: Cell::Found,
                    equal: true,
                });
            } else {
                tracing::debug!("Sequence {} does not exist in destination", sequence);
                result.push_missing(sequence.to_string(), Cell::Blank);
                missing_sequences.push(sequence.clone());
            }
        }

        SequenceDiff {
            source_count: source.sequences.len(),
            destination_count: destination.sequences.len(),
            counts_equal: source.sequences.len() == destination.sequences.len(),
            missing_sequences,
            result,
        }
    }

    pub fn compare_views(&self, source: &Snapshot, destination: &Snapshot) -> DiffResult {
        let mut result = self.result(ObjectKind::View);
        for view in &source.views {
            self.presence(&mut result, view.to_string(), destination.contains_view(view));
        }
        result
    }

    /// Functions match on schema, name, and argument signature
    pub fn compare_functions(&self, source: &Snapshot, destination: &Snapshot) -> DiffResult {
        let mut result = self.result(ObjectKind::Function);
        for function in &source.functions {
            self.presence(
                &mut result,
                function.to_string(),
                destination.contains_function(function),
            );
        }
        result
    }

    fn presence(&self, result: &mut DiffResult, name: String, found: bool) {
        if found {
            result.push_row(DiffRow {
                name,
                source: Cell::Found,
                destination: Cell::Found,
                equal: true,
            });
        } else {
            tracing::debug!("{} {} does not exist in destination", result.kind, name);
            result.push_missing(name, Cell::Found);
        }
    }

    /// Run each statistics query on both sides and compare the values
    pub async fn compare_statistics(
        &self,
        queries: &[StatQuery],
        source_reader: &dyn CatalogSource,
        destination_reader: &dyn CatalogSource,
    ) -> DiffResult {
        let mut result = self.result(ObjectKind::Statistic);

        for stat in queries {
            let source_count = match source_reader.scalar_count(stat.query, stat.name).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Failed to get source count for {}: {}", stat.name, e);
                    result.push_failure(stat.name, Side::Source, e, Cell::Failed, Cell::Failed);
                    continue;
                }
            };
            match destination_reader.scalar_count(stat.query, stat.name).await {
                Ok(count) => result.push_counts(stat.name, source_count, count),
                Err(e) => {
                    tracing::error!("Failed to get destination count for {}: {}", stat.name, e);
                    result.push_failure(
                        stat.name,
                        Side::Destination,
                        e,
                        Cell::Count(source_count),
                        Cell::Failed,
                    );
                }
            }
        }

        result
    }

    /// Every comparison, in the order the report prints them
    pub async fn compare(
        &self,
        source: &Snapshot,
        destination: &Snapshot,
        source_reader: &dyn CatalogSource,
        destination_reader: &dyn CatalogSource,
        on_table: impl FnMut(&Table),
    ) -> ComparisonReport {
        let tables = self
            .compare_tables(source, destination, source_reader, destination_reader, on_table)
            .await;
        let indexes = self
            .compare_indexes(source, destination, source_reader)
            .await;
        let sequences = self.compare_sequences(source, destination);
        let views = self.compare_views(source, destination);
        let functions = self.compare_functions(source, destination);
        let statistics = self
            .compare_statistics(STAT_QUERIES, source_reader, destination_reader)
            .await;

        ComparisonReport {
            tables,
            indexes,
            sequences,
            views,
            functions,
            statistics,
        }
    }
}
