// ABOUTME: In-memory CatalogSource test double used by unit and scenario tests
// ABOUTME: Serves a fixed Snapshot plus scripted row counts and failures

use super::model::{Function, IndexRef, LiveConnection, Sequence, Snapshot, Table, View};
use super::reader::CatalogSource;
use crate::error::{CatalogError, CatalogResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// Which failure a scripted accessor should raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Timeout,
    Connection,
    Query,
}

impl ScriptedFailure {
    fn raise(self, context: String) -> CatalogError {
        match self {
            ScriptedFailure::Timeout => CatalogError::Timeout { context },
            ScriptedFailure::Connection => CatalogError::Connection {
                context,
                message: "connection closed".to_string(),
            },
            ScriptedFailure::Query => CatalogError::Query {
                context,
                message: "scripted failure".to_string(),
            },
        }
    }
}

/// Test double for [`CatalogSource`]; no command reads from it
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    label: String,
    snapshot: Snapshot,
    row_counts: HashMap<String, i64>,
    row_count_failures: HashMap<String, ScriptedFailure>,
    scalar_counts: HashMap<String, i64>,
    index_definitions: HashMap<String, String>,
    roles: Vec<String>,
    fail_tables: Option<ScriptedFailure>,
    fail_connections: Option<ScriptedFailure>,
}

impl MemoryCatalog {
    pub fn new(label: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            label: label.into(),
            snapshot,
            ..Default::default()
        }
    }

    /// Row count served for `schema.name`
    pub fn with_row_count(mut self, table: &str, count: i64) -> Self {
        self.row_counts.insert(table.to_string(), count);
        self
    }

    pub fn with_row_count_failure(mut self, table: &str, failure: ScriptedFailure) -> Self {
        self.row_count_failures.insert(table.to_string(), failure);
        self
    }

    pub fn with_scalar_count(mut self, query: &str, count: i64) -> Self {
        self.scalar_counts.insert(query.to_string(), count);
        self
    }

    pub fn with_index_definition(mut self, index: &str, definition: &str) -> Self {
        self.index_definitions
            .insert(index.to_string(), definition.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    pub fn failing_tables(mut self, failure: ScriptedFailure) -> Self {
        self.fail_tables = Some(failure);
        self
    }

    pub fn failing_connections(mut self, failure: ScriptedFailure) -> Self {
        self.fail_connections = Some(failure);
        self
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    fn label(&self) -> &str {
        &self.label
    }

    async fn tables(&self) -> CatalogResult<Vec<Table>> {
        match self.fail_tables {
            Some(failure) => Err(failure.raise("listing tables".to_string())),
            None => Ok(self.snapshot.tables.clone()),
        }
    }

    async fn sequences(&self) -> CatalogResult<Vec<Sequence>> {
        Ok(self.snapshot.sequences.clone())
    }

    async fn views(&self) -> CatalogResult<Vec<View>> {
        Ok(self.snapshot.views.clone())
    }

    async fn functions(&self) -> CatalogResult<Vec<Function>> {
        Ok(self.snapshot.functions.clone())
    }

    async fn indexes(&self) -> CatalogResult<Vec<IndexRef>> {
        Ok(self.snapshot.indexes.clone())
    }

    async fn index_count(&self) -> CatalogResult<i64> {
        Ok(self.snapshot.index_count)
    }

    async fn live_connections(&self) -> CatalogResult<Vec<LiveConnection>> {
        match self.fail_connections {
            Some(failure) => Err(failure.raise("listing connections".to_string())),
            None => Ok(self.snapshot.connections.clone()),
        }
    }

    async fn scalar_count(&self, query: &str, what: &str) -> CatalogResult<i64> {
        self.scalar_counts.get(query).copied().ok_or_else(|| {
            ScriptedFailure::Query.raise(format!("counting {}", what))
        })
    }

    async fn table_row_count(&self, table: &Table) -> CatalogResult<i64> {
        let key = table.to_string();
        let context = format!("counting rows of {}", key);
        if let Some(failure) = self.row_count_failures.get(&key) {
            return Err(failure.raise(context));
        }
        self.row_counts
            .get(&key)
            .copied()
            .ok_or_else(|| ScriptedFailure::Query.raise(context))
    }

    async fn index_definition(&self, index: &str) -> CatalogResult<String> {
        self.index_definitions.get(index).cloned().ok_or_else(|| {
            ScriptedFailure::Query.raise(format!("reading definition of index {}", index))
        })
    }

    async fn role_exists(&self, role: &str) -> CatalogResult<bool> {
        Ok(self.roles.iter().any(|r| r == role))
    }
}
