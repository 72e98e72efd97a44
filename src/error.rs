// ABOUTME: Typed error taxonomy for catalog access
// ABOUTME: Separates connection loss, statement timeouts, and ordinary query failures

use tokio_postgres::error::SqlState;

/// Errors raised by a single catalog accessor
///
/// A `CatalogError` only ever invalidates the call that produced it. Callers
/// decide whether to abort the run (object lists) or record the failure and
/// move on (row counts, scalar counts).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The session is gone: network failure, authentication, closed socket
    #[error("connection error while {context}: {message}")]
    Connection { context: String, message: String },

    /// The statement was cancelled by `statement_timeout`
    #[error("statement timed out while {context}")]
    Timeout { context: String },

    /// Any other server-side or decode failure
    #[error("query failed while {context}: {message}")]
    Query { context: String, message: String },
}

impl CatalogError {
    /// Classify a driver error raised while doing `context`
    pub fn from_pg(context: impl Into<String>, err: tokio_postgres::Error) -> Self {
        let context = context.into();

        if err.code() == Some(&SqlState::QUERY_CANCELED) {
            return CatalogError::Timeout { context };
        }

        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };

        if err.is_closed() {
            CatalogError::Connection { context, message }
        } else {
            CatalogError::Query { context, message }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CatalogError::Timeout { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, CatalogError::Connection { .. })
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
