// ABOUTME: Catalog introspection queries against one database
// ABOUTME: Each accessor is independently fallible; undecodable rows are logged and skipped

use super::model::{ColumnRef, Function, IndexRef, LiveConnection, Sequence, Table, View};
use crate::error::{CatalogError, CatalogResult};
use crate::utils::{qualified, quote_literal};
use async_trait::async_trait;
use std::fmt;
use tokio_postgres::{Client, Row};

/// Read access to one database catalog
///
/// Every accessor stands alone: a failure in one leaves data fetched by the
/// others valid, and the caller decides whether to abort or continue.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Label used in logs and reports ("source", "destination")
    fn label(&self) -> &str;

    async fn tables(&self) -> CatalogResult<Vec<Table>>;
    async fn sequences(&self) -> CatalogResult<Vec<Sequence>>;
    async fn views(&self) -> CatalogResult<Vec<View>>;
    async fn functions(&self) -> CatalogResult<Vec<Function>>;
    async fn indexes(&self) -> CatalogResult<Vec<IndexRef>>;
    async fn index_count(&self) -> CatalogResult<i64>;
    async fn live_connections(&self) -> CatalogResult<Vec<LiveConnection>>;

    /// Run a single-value `count(*)`-style query
    async fn scalar_count(&self, query: &str, what: &str) -> CatalogResult<i64>;

    /// Exact row count of one table, bounded by the statement timeout
    async fn table_row_count(&self, table: &Table) -> CatalogResult<i64>;

    /// `CREATE INDEX` text for an index, used to explain a missing index
    async fn index_definition(&self, index: &str) -> CatalogResult<String>;

    async fn role_exists(&self, role: &str) -> CatalogResult<bool>;
}

const TABLES_QUERY: &str = "
    SELECT schemaname, tablename, tableowner
    FROM pg_catalog.pg_tables
    WHERE schemaname NOT IN ('information_schema', 'pg_catalog', 'pglogical')
      AND tablename != 'spatial_ref_sys'";

const SEQUENCES_QUERY: &str = "
    SELECT n.nspname, c.relname, r.rolname,
           owner_column.table_schema, owner_column.table_name, owner_column.column_name
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_catalog.pg_roles r ON r.oid = c.relowner
    LEFT JOIN LATERAL (
        SELECT tn.nspname::text AS table_schema,
               t.relname::text AS table_name,
               a.attname::text AS column_name
          FROM pg_catalog.pg_depend d
          JOIN pg_catalog.pg_class t ON t.oid = d.refobjid
          JOIN pg_catalog.pg_namespace tn ON tn.oid = t.relnamespace
          JOIN pg_catalog.pg_attribute a
            ON a.attrelid = d.refobjid AND a.attnum = d.refobjsubid
         WHERE d.classid = 'pg_catalog.pg_class'::regclass
           AND d.refclassid = 'pg_catalog.pg_class'::regclass
           AND d.objid = c.oid
           AND d.deptype IN ('a', 'i')
         LIMIT 1
    ) owner_column ON true
    WHERE c.relkind = 'S'
    ORDER BY n.nspname, c.relname";

const VIEWS_QUERY: &str = "
    SELECT schemaname, viewname, viewowner
    FROM pg_catalog.pg_views
    WHERE schemaname NOT IN ('pg_catalog', 'repack', 'information_schema')";

const FUNCTIONS_QUERY: &str = "
    SELECT n.nspname, p.proname,
           pg_catalog.pg_get_function_arguments(p.oid),
           r.rolname
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON p.pronamespace = n.oid
    JOIN pg_catalog.pg_roles r ON p.proowner = r.oid
    WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')
    ORDER BY n.nspname, p.proname";

const INDEXES_QUERY: &str = "
    SELECT tablename, indexname
    FROM pg_catalog.pg_indexes
    WHERE schemaname NOT IN ('pg_catalog', 'information_schema')";

const CONNECTIONS_QUERY: &str = "
    SELECT pid, usename::text, datname::text, client_addr::text, state, query
    FROM pg_catalog.pg_stat_activity";

/// [`CatalogSource`] backed by a live `tokio_postgres` session
pub struct PgCatalogReader<'a> {
    client: &'a Client,
    label: String,
    row_count_timeout: String,
}

impl<'a> PgCatalogReader<'a> {
    pub fn new(client: &'a Client, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
            row_count_timeout: "10min".to_string(),
        }
    }

    /// Override the `statement_timeout` applied to row counts
    pub fn with_row_count_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.row_count_timeout = timeout.into();
        self
    }

    async fn query(&self, sql: &str, what: &str) -> CatalogResult<Vec<Row>> {
        tracing::info!(server = %self.label, "Getting {}", what);
        self.client
            .query(sql, &[])
            .await
            .map_err(|e| CatalogError::from_pg(format!("listing {}", what), e))
    }

    fn decode<T>(
        &self,
        rows: Vec<Row>,
        what: &str,
        decode: impl Fn(&Row) -> Result<T, tokio_postgres::Error>,
    ) -> Vec<T> {
        decode_rows(&self.label, &rows, what, |row: &&Row| decode(*row))
    }
}

/// Decode every row, logging and dropping the ones that fail
///
/// The remaining rows keep their order.
pub(crate) fn decode_rows<R, T, E: fmt::Display>(
    label: &str,
    rows: impl IntoIterator<Item = R>,
    what: &str,
    decode: impl Fn(&R) -> Result<T, E>,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match decode(&row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!(server = %label, "Skipping unreadable {} row: {}", what, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl CatalogSource for PgCatalogReader<'_> {
    fn label(&self) -> &str {
        &self.label
    }

    async fn tables(&self) -> CatalogResult<Vec<Table>> {
        let rows = self.query(TABLES_QUERY, "tables").await?;
        Ok(self.decode(rows, "table", |row| {
            Ok(Table {
                schema: row.try_get(0)?,
                name: row.try_get(1)?,
                owner: row.try_get(2)?,
            })
        }))
    }

    async fn sequences(&self) -> CatalogResult<Vec<Sequence>> {
        let rows = self.query(SEQUENCES_QUERY, "sequences").await?;
        Ok(self.decode(rows, "sequence", |row| {
            let schema: Option<String> = row.try_get(3)?;
            let table: Option<String> = row.try_get(4)?;
            let column: Option<String> = row.try_get(5)?;
            let owned_by = match (schema, table, column) {
                (Some(schema), Some(table), Some(column)) => Some(ColumnRef {
                    schema: Some(schema),
                    table,
                    column,
                }),
                _ => None,
            };
            Ok(Sequence {
                schema: row.try_get(0)?,
                name: row.try_get(1)?,
                owner: row.try_get(2)?,
                owned_by,
            })
        }))
    }

    async fn views(&self) -> CatalogResult<Vec<View>> {
        let rows = self.query(VIEWS_QUERY, "views").await?;
        Ok(self.decode(rows, "view", |row| {
            Ok(View {
                schema: row.try_get(0)?,
                name: row.try_get(1)?,
                owner: row.try_get(2)?,
            })
        }))
    }

    async fn functions(&self) -> CatalogResult<Vec<Function>> {
        let rows = self.query(FUNCTIONS_QUERY, "functions").await?;
        Ok(self.decode(rows, "function", |row| {
            Ok(Function {
                schema: row.try_get(0)?,
                name: row.try_get(1)?,
                arguments: row.try_get(2)?,
                owner: row.try_get(3)?,
            })
        }))
    }

    async fn indexes(&self) -> CatalogResult<Vec<IndexRef>> {
        let rows = self.query(INDEXES_QUERY, "indexes list").await?;
        Ok(self.decode(rows, "index", |row| {
            Ok(IndexRef {
                table: row.try_get(0)?,
                index: row.try_get(1)?,
            })
        }))
    }

    async fn index_count(&self) -> CatalogResult<i64> {
        tracing::info!(server = %self.label, "Getting indexes count");
        self.scalar_count("SELECT COUNT(*) FROM pg_catalog.pg_indexes", "indexes")
            .await
    }

    async fn live_connections(&self) -> CatalogResult<Vec<LiveConnection>> {
        let rows = self.query(CONNECTIONS_QUERY, "connections list").await?;
        Ok(self.decode(rows, "connection", |row| {
            Ok(LiveConnection {
                pid: row.try_get(0)?,
                username: row.try_get(1)?,
                database: row.try_get(2)?,
                client_address: row.try_get(3)?,
                state: row.try_get(4)?,
                query: row.try_get(5)?,
            })
        }))
    }

    async fn scalar_count(&self, query: &str, what: &str) -> CatalogResult<i64> {
        tracing::debug!(server = %self.label, "Getting count for {}", what);
        let context = format!("counting {}", what);
        let row = self
            .client
            .query_one(query, &[])
            .await
            .map_err(|e| CatalogError::from_pg(context.clone(), e))?;
        row.try_get(0)
            .map_err(|e| CatalogError::from_pg(context, e))
    }

    async fn table_row_count(&self, table: &Table) -> CatalogResult<i64> {
        tracing::debug!(server = %self.label, "Getting row count for {}", table);
        let context = format!("counting rows of {}", table);

        self.client
            .batch_execute(&format!(
                "SET statement_timeout TO {}",
                quote_literal(&self.row_count_timeout)
            ))
            .await
            .map_err(|e| CatalogError::from_pg(format!("setting timeout for {}", table), e))?;

        let result = self
            .client
            .query_one(
                &format!(
                    "SELECT COUNT(*) FROM {}",
                    qualified(&table.schema, &table.name)
                ),
                &[],
            )
            .await;

        if let Err(e) = self.client.batch_execute("RESET statement_timeout").await {
            tracing::warn!(server = %self.label, "Failed to reset statement_timeout: {}", e);
        }

        let row = result.map_err(|e| CatalogError::from_pg(context.clone(), e))?;
        row.try_get(0)
            .map_err(|e| CatalogError::from_pg(context, e))
    }

    async fn index_definition(&self, index: &str) -> CatalogResult<String> {
        let context = format!("reading definition of index {}", index);
        let row = self
            .client
            .query_one("SELECT pg_get_indexdef($1::text::regclass)", &[&index])
            .await
            .map_err(|e| CatalogError::from_pg(context.clone(), e))?;
        row.try_get(0)
            .map_err(|e| CatalogError::from_pg(context, e))
    }

    async fn role_exists(&self, role: &str) -> CatalogResult<bool> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*) FROM pg_catalog.pg_roles WHERE rolname = $1",
                &[&role],
            )
            .await
            .map_err(|e| CatalogError::from_pg(format!("looking up role {}", role), e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| CatalogError::from_pg(format!("looking up role {}", role), e))?;
        Ok(count > 0)
    }
}
