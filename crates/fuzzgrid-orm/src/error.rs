//! Error types for the record engine.

use thiserror::Error;

/// Result type alias for record engine operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Failures surfaced by a [`TableClient`](crate::table::TableClient)
/// implementation. Not-found and conflict must stay distinguishable: the
/// engine recovers from the former and reports the latter as a structured
/// error value.
#[derive(Debug, Error)]
pub enum TableError {
    /// Point lookup or delete target is absent.
    #[error("entity not found")]
    NotFound,

    /// Insert over an existing key, or conditional replace with a stale token.
    #[error("entity conflict")]
    Conflict,

    /// Malformed server-side filter expression.
    #[error("invalid filter expression: {0}")]
    Filter(String),

    /// Any other backend failure.
    #[error("table backend error: {0}")]
    Backend(String),
}

/// Errors produced by the record engine.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Create of a record whose key already exists. Recoverable.
    #[error("row already exists in {table}: {partition_key}/{row_key}")]
    RowExists {
        table: &'static str,
        partition_key: String,
        row_key: String,
    },

    /// Conditional replace lost against a concurrent writer. Recoverable;
    /// the caller must re-fetch before retrying.
    #[error("etag mismatch in {table}: {partition_key}/{row_key}")]
    EtagMismatch {
        table: &'static str,
        partition_key: String,
        row_key: String,
    },

    /// Record type declaration is inconsistent with the data seen.
    #[error("schema error: {0}")]
    Schema(String),

    /// Query referenced a field the record type does not declare.
    #[error("unknown query field {field:?} for table {table}")]
    UnknownField {
        table: &'static str,
        field: String,
    },

    /// A key column held a value that cannot act as a table key.
    #[error("unsupported key type: {0}")]
    UnsupportedKey(String),

    /// Wire row (de)serialization failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The update queue rejected a follow-up message.
    #[error("update queue error: {0}")]
    Queue(#[source] anyhow::Error),

    /// Any other store failure, propagated unchanged.
    #[error("store error: {0}")]
    Store(#[from] TableError),
}
