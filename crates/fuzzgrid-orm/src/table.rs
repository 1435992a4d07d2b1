//! The table client seam.
//!
//! A wire row is a flat column → value mapping. `PartitionKey` and `RowKey`
//! are the row's identity, `Timestamp` and `etag` are store-assigned and
//! read-only. Implementations must keep not-found and conflict
//! distinguishable from other failures; the engine's recovery behavior
//! depends on it.

use serde_json::Value;

use crate::error::TableError;

/// A flat wire row: column name → string/number (non-primitive domain
/// values arrive already blob-encoded into string columns).
pub type WireRow = serde_json::Map<String, Value>;

/// Reserved column names.
pub mod columns {
    /// Partition key of the row. Immutable identity.
    pub const PARTITION_KEY: &str = "PartitionKey";
    /// Row key. Immutable identity.
    pub const ROW_KEY: &str = "RowKey";
    /// Store-assigned last-write time. Never written by clients.
    pub const TIMESTAMP: &str = "Timestamp";
    /// Store-assigned concurrency token.
    pub const ETAG: &str = "etag";
}

/// Client for a partitioned key-value table store.
pub trait TableClient: Send + Sync {
    /// Point lookup. `TableError::NotFound` when the row is absent.
    fn get_entity(&self, table: &str, partition_key: &str, row_key: &str)
    -> Result<WireRow, TableError>;

    /// Insert a new row; `TableError::Conflict` when the key exists.
    /// Returns the assigned concurrency token.
    fn insert_entity(&self, table: &str, row: &WireRow) -> Result<String, TableError>;

    /// Replace an existing row only if its current token equals `if_match`;
    /// `TableError::Conflict` on a stale token, `NotFound` if absent.
    fn replace_entity(
        &self,
        table: &str,
        row: &WireRow,
        if_match: &str,
    ) -> Result<String, TableError>;

    /// Insert or blindly overwrite.
    fn upsert_entity(&self, table: &str, row: &WireRow) -> Result<String, TableError>;

    /// Delete a row; `TableError::NotFound` when it was already absent.
    fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str)
    -> Result<(), TableError>;

    /// Query rows matching a server-side filter expression, up to `limit`.
    fn query_entities(
        &self,
        table: &str,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<WireRow>, TableError>;
}
