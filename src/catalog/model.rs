// ABOUTME: Typed catalog objects and the immutable Snapshot bundle
// ABOUTME: Identity is schema-qualified name, never internal OIDs

use super::reader::CatalogSource;
use crate::error::CatalogResult;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
    Sequence,
    View,
    Function,
    Statistic,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
            ObjectKind::Sequence => "sequence",
            ObjectKind::View => "view",
            ObjectKind::Function => "function",
            ObjectKind::Statistic => "statistic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    pub owner: String,
    /// Owning column recorded in `pg_depend`, if any
    pub owned_by: Option<ColumnRef>,
}

/// A table column, kept as separate identifiers so names containing dots survive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRef {
    /// Unset means the table is resolved through `search_path`
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(schema: &str, table: &str, column: &str) -> Self {
        Self {
            schema: Some(schema.to_string()),
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub schema: String,
    pub name: String,
    pub owner: String,
    /// Output of `pg_get_function_arguments`; distinguishes overloads
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    pub table: String,
    pub index: String,
}

/// A row of `pg_stat_activity`; every column may be NULL for background workers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveConnection {
    pub pid: i32,
    pub username: Option<String>,
    pub database: Option<String>,
    pub client_address: Option<String>,
    pub state: Option<String>,
    pub query: Option<String>,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.schema, self.name, self.arguments)
    }
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.index, self.table)
    }
}

/// Any catalog object with an owner, as seen by the reconciler
pub trait Owned {
    fn schema(&self) -> &str;
    fn owner(&self) -> &str;
}

macro_rules! impl_owned {
    ($($ty:ty),*) => {
        $(impl Owned for $ty {
            fn schema(&self) -> &str {
                &self.schema
            }
            fn owner(&self) -> &str {
                &self.owner
            }
        })*
    };
}

impl_owned!(Table, Sequence, View, Function);

/// Point-in-time capture of one database's catalog
///
/// Produced once by [`Snapshot::capture`] and only read afterwards. Row counts
/// are not part of the snapshot: the diff engine fetches them lazily, one table
/// at a time, so a slow table cannot stall the capture.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tables: Vec<Table>,
    pub sequences: Vec<Sequence>,
    pub views: Vec<View>,
    pub functions: Vec<Function>,
    pub indexes: Vec<IndexRef>,
    pub index_count: i64,
    pub connections: Vec<LiveConnection>,
}

impl Snapshot {
    /// Run every catalog accessor once, in order
    ///
    /// Object lists and the index count are required; the first failure aborts
    /// the capture. Live connections are informational, so a failure there is
    /// logged and the snapshot carries an empty list.
    pub async fn capture(source: &dyn CatalogSource) -> CatalogResult<Snapshot> {
        let tables = source.tables().await?;
        let sequences = source.sequences().await?;
        let views = source.views().await?;
        let functions = source.functions().await?;
        let indexes = source.indexes().await?;
        let index_count = source.index_count().await?;

        let connections = match source.live_connections().await {
            Ok(connections) => connections,
            Err(e) => {
                tracing::warn!("Failed to list live connections: {}", e);
                Vec::new()
            }
        };

        tracing::debug!(
            "Captured {} tables, {} sequences, {} views, {} functions, {} indexes",
            tables.len(),
            sequences.len(),
            views.len(),
            functions.len(),
            indexes.len()
        );

        Ok(Snapshot {
            tables,
            sequences,
            views,
            functions,
            indexes,
            index_count,
            connections,
        })
    }

    /// New snapshot limited to the allow-listed table and sequence names
    ///
    /// An empty allow-list keeps every object of that kind.
    pub fn restrict(&self, tables: &[String], sequences: &[String]) -> Snapshot {
        let mut restricted = self.clone();
        if !tables.is_empty() {
            restricted.tables.retain(|t| tables.contains(&t.name));
        }
        if !sequences.is_empty() {
            restricted.sequences.retain(|s| sequences.contains(&s.name));
        }
        restricted
    }

    pub fn contains_table(&self, table: &Table) -> bool {
        self.tables
            .iter()
            .any(|t| t.schema == table.schema && t.name == table.name)
    }

    pub fn contains_sequence(&self, sequence: &Sequence) -> bool {
        self.sequences
            .iter()
            .any(|s| s.schema == sequence.schema && s.name == sequence.name)
    }

    pub fn contains_view(&self, view: &View) -> bool {
        self.views
            .iter()
            .any(|v| v.schema == view.schema && v.name == view.name)
    }

    pub fn contains_function(&self, function: &Function) -> bool {
        self.functions.iter().any(|f| {
            f.schema == function.schema
                && f.name == function.name
                && f.arguments == function.arguments
        })
    }

    pub fn contains_index(&self, index: &str) -> bool {
        self.indexes.iter().any(|i| i.index == index)
    }
}
