//! Embedded table backend for FuzzGrid — redb-backed `TableClient`.
//!
//! Rows are JSON-serialized into redb's `&[u8]` value columns, one redb
//! table per logical table. The backend assigns the concurrency token
//! (`W/"n"`, a per-row monotone revision carried in the row itself) and
//! the `Timestamp` column on every write, and evaluates server-side
//! filter expressions with [`crate::expr`]. Supports both on-disk and
//! in-memory databases (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;
use tracing::debug;

use crate::error::TableError;
use crate::expr::Expr;
use crate::table::{TableClient, WireRow, columns};

/// Convert any `Display` error into a `TableError::Backend`.
macro_rules! backend_err {
    () => {
        |e| TableError::Backend(e.to_string())
    };
}

/// Unit separator keeps `{partition_key}{row_key}` composites unambiguous.
const KEY_SEPARATOR: char = '\u{1f}';

fn composite_key(partition_key: &str, row_key: &str) -> String {
    format!("{partition_key}{KEY_SEPARATOR}{row_key}")
}

fn table_def(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

/// Embedded table store backed by redb.
#[derive(Clone)]
pub struct RedbTableClient {
    db: Arc<Database>,
}

impl RedbTableClient {
    /// Open (or create) a persistent table store at the given path.
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let db = Database::create(path).map_err(backend_err!())?;
        debug!(?path, "table store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an ephemeral in-memory table store (for testing).
    pub fn open_in_memory() -> Result<Self, TableError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(backend_err!())?;
        debug!("in-memory table store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Write `row` under its composite key, stamping `etag` and
    /// `Timestamp`. `guard` sees the previous row (if any) and decides
    /// whether the write may proceed.
    fn write_row(
        &self,
        table: &str,
        row: &WireRow,
        guard: impl FnOnce(Option<&WireRow>) -> Result<(), TableError>,
    ) -> Result<String, TableError> {
        let (partition_key, row_key) = row_keys(row)?;
        let key = composite_key(&partition_key, &row_key);

        let txn = self.db.begin_write().map_err(backend_err!())?;
        let etag;
        {
            let mut t = txn.open_table(table_def(table)).map_err(backend_err!())?;

            let existing = match t.get(key.as_str()).map_err(backend_err!())? {
                Some(value) => Some(decode_row(value.value())?),
                None => None,
            };
            guard(existing.as_ref())?;

            etag = next_etag(existing.as_ref());
            let mut stored = row.clone();
            stored.insert(columns::ETAG.to_string(), Value::String(etag.clone()));
            stored.insert(
                columns::TIMESTAMP.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );

            let bytes = serde_json::to_vec(&Value::Object(stored)).map_err(backend_err!())?;
            t.insert(key.as_str(), bytes.as_slice())
                .map_err(backend_err!())?;
        }
        txn.commit().map_err(backend_err!())?;
        debug!(table, %partition_key, %row_key, %etag, "row written");
        Ok(etag)
    }
}

impl TableClient for RedbTableClient {
    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<WireRow, TableError> {
        let txn = self.db.begin_read().map_err(backend_err!())?;
        let t = match txn.open_table(table_def(table)) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Err(TableError::NotFound),
            Err(e) => return Err(TableError::Backend(e.to_string())),
        };
        let key = composite_key(partition_key, row_key);
        match t.get(key.as_str()).map_err(backend_err!())? {
            Some(value) => decode_row(value.value()),
            None => Err(TableError::NotFound),
        }
    }

    fn insert_entity(&self, table: &str, row: &WireRow) -> Result<String, TableError> {
        self.write_row(table, row, |existing| match existing {
            Some(_) => Err(TableError::Conflict),
            None => Ok(()),
        })
    }

    fn replace_entity(
        &self,
        table: &str,
        row: &WireRow,
        if_match: &str,
    ) -> Result<String, TableError> {
        let expected = if_match.to_string();
        self.write_row(table, row, move |existing| match existing {
            None => Err(TableError::NotFound),
            Some(current) => {
                let current_etag = current
                    .get(columns::ETAG)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if current_etag == expected {
                    Ok(())
                } else {
                    Err(TableError::Conflict)
                }
            }
        })
    }

    fn upsert_entity(&self, table: &str, row: &WireRow) -> Result<String, TableError> {
        self.write_row(table, row, |_| Ok(()))
    }

    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), TableError> {
        let txn = self.db.begin_write().map_err(backend_err!())?;
        let existed;
        {
            let mut t = txn.open_table(table_def(table)).map_err(backend_err!())?;
            let key = composite_key(partition_key, row_key);
            existed = t.remove(key.as_str()).map_err(backend_err!())?.is_some();
        }
        txn.commit().map_err(backend_err!())?;
        if !existed {
            return Err(TableError::NotFound);
        }
        debug!(table, %partition_key, %row_key, "row deleted");
        Ok(())
    }

    fn query_entities(
        &self,
        table: &str,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<WireRow>, TableError> {
        let parsed = match filter {
            Some(f) => Some(Expr::parse(f)?),
            None => None,
        };

        let txn = self.db.begin_read().map_err(backend_err!())?;
        let t = match txn.open_table(table_def(table)) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(TableError::Backend(e.to_string())),
        };

        let mut rows = Vec::new();
        for entry in t.iter().map_err(backend_err!())? {
            let (_, value) = entry.map_err(backend_err!())?;
            let row = decode_row(value.value())?;
            if parsed.as_ref().is_none_or(|expr| expr.matches(&row)) {
                rows.push(row);
                if limit.is_some_and(|n| rows.len() >= n) {
                    break;
                }
            }
        }
        Ok(rows)
    }
}

fn row_keys(row: &WireRow) -> Result<(String, String), TableError> {
    let get = |column: &str| {
        row.get(column)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TableError::Backend(format!("row missing {column} column")))
    };
    Ok((get(columns::PARTITION_KEY)?, get(columns::ROW_KEY)?))
}

fn decode_row(bytes: &[u8]) -> Result<WireRow, TableError> {
    match serde_json::from_slice(bytes).map_err(backend_err!())? {
        Value::Object(map) => Ok(map),
        other => Err(TableError::Backend(format!(
            "stored row is not an object: {other}"
        ))),
    }
}

/// Next concurrency token for a row: a monotone per-row revision.
fn next_etag(existing: Option<&WireRow>) -> String {
    let revision = existing
        .and_then(|row| row.get(columns::ETAG))
        .and_then(Value::as_str)
        .and_then(parse_revision)
        .unwrap_or(0);
    format!("W/\"{}\"", revision + 1)
}

fn parse_revision(etag: &str) -> Option<u64> {
    etag.strip_prefix("W/\"")?.strip_suffix('"')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_row(partition_key: &str, row_key: &str, state: &str) -> WireRow {
        let mut row = WireRow::new();
        row.insert(
            columns::PARTITION_KEY.to_string(),
            json!(partition_key),
        );
        row.insert(columns::ROW_KEY.to_string(), json!(row_key));
        row.insert("state".to_string(), json!(state));
        row
    }

    #[test]
    fn insert_then_get_round_trips_columns() {
        let client = RedbTableClient::open_in_memory().unwrap();
        let etag = client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();

        let row = client.get_entity("Node", "linux", "m-1").unwrap();
        assert_eq!(row.get("state"), Some(&json!("init")));
        assert_eq!(row.get(columns::ETAG), Some(&json!(etag)));
        assert!(row.contains_key(columns::TIMESTAMP));
    }

    #[test]
    fn get_missing_row_is_not_found() {
        let client = RedbTableClient::open_in_memory().unwrap();
        assert!(matches!(
            client.get_entity("Node", "linux", "nope"),
            Err(TableError::NotFound)
        ));
    }

    #[test]
    fn insert_conflicts_on_existing_key() {
        let client = RedbTableClient::open_in_memory().unwrap();
        client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();
        assert!(matches!(
            client.insert_entity("Node", &wire_row("linux", "m-1", "busy")),
            Err(TableError::Conflict)
        ));
        // The original row is untouched.
        let row = client.get_entity("Node", "linux", "m-1").unwrap();
        assert_eq!(row.get("state"), Some(&json!("init")));
    }

    #[test]
    fn etags_are_monotone_per_row() {
        let client = RedbTableClient::open_in_memory().unwrap();
        let first = client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();
        let second = client
            .upsert_entity("Node", &wire_row("linux", "m-1", "busy"))
            .unwrap();
        assert_eq!(first, "W/\"1\"");
        assert_eq!(second, "W/\"2\"");
    }

    #[test]
    fn replace_requires_matching_etag() {
        let client = RedbTableClient::open_in_memory().unwrap();
        let etag = client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();

        // Stale token loses.
        assert!(matches!(
            client.replace_entity("Node", &wire_row("linux", "m-1", "busy"), "W/\"0\""),
            Err(TableError::Conflict)
        ));

        let replaced = client
            .replace_entity("Node", &wire_row("linux", "m-1", "busy"), &etag)
            .unwrap();
        assert_ne!(replaced, etag);

        // The old token is now stale.
        assert!(matches!(
            client.replace_entity("Node", &wire_row("linux", "m-1", "free"), &etag),
            Err(TableError::Conflict)
        ));
    }

    #[test]
    fn replace_missing_row_is_not_found() {
        let client = RedbTableClient::open_in_memory().unwrap();
        assert!(matches!(
            client.replace_entity("Node", &wire_row("linux", "m-1", "init"), "W/\"1\""),
            Err(TableError::NotFound)
        ));
    }

    #[test]
    fn delete_distinguishes_missing_rows() {
        let client = RedbTableClient::open_in_memory().unwrap();
        client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();

        client.delete_entity("Node", "linux", "m-1").unwrap();
        assert!(matches!(
            client.delete_entity("Node", "linux", "m-1"),
            Err(TableError::NotFound)
        ));
    }

    #[test]
    fn query_filters_server_side() {
        let client = RedbTableClient::open_in_memory().unwrap();
        client
            .insert_entity("Node", &wire_row("linux", "m-1", "init"))
            .unwrap();
        client
            .insert_entity("Node", &wire_row("linux", "m-2", "busy"))
            .unwrap();
        client
            .insert_entity("Node", &wire_row("windows", "m-3", "init"))
            .unwrap();

        let rows = client
            .query_entities("Node", Some("state eq 'init'"), None)
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = client
            .query_entities(
                "Node",
                Some("state eq 'init' and PartitionKey eq 'windows'"),
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(columns::ROW_KEY), Some(&json!("m-3")));
    }

    #[test]
    fn query_honors_limit() {
        let client = RedbTableClient::open_in_memory().unwrap();
        for i in 0..5 {
            client
                .insert_entity("Node", &wire_row("linux", &format!("m-{i}"), "init"))
                .unwrap();
        }
        let rows = client.query_entities("Node", None, Some(3)).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn query_on_missing_table_is_empty() {
        let client = RedbTableClient::open_in_memory().unwrap();
        assert!(client.query_entities("Node", None, None).unwrap().is_empty());
    }

    #[test]
    fn bad_filter_expression_is_rejected() {
        let client = RedbTableClient::open_in_memory().unwrap();
        assert!(matches!(
            client.query_entities("Node", Some("state eq"), None),
            Err(TableError::Filter(_))
        ));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tables.redb");

        let etag = {
            let client = RedbTableClient::open(&db_path).unwrap();
            client
                .insert_entity("Pool", &wire_row("linux", "linux", "running"))
                .unwrap()
        };

        // Reopen the same database file; revisions keep counting up.
        let client = RedbTableClient::open(&db_path).unwrap();
        let row = client.get_entity("Pool", "linux", "linux").unwrap();
        assert_eq!(row.get(columns::ETAG), Some(&json!(etag)));
        let next = client
            .upsert_entity("Pool", &wire_row("linux", "linux", "halt"))
            .unwrap();
        assert_eq!(next, "W/\"2\"");
    }
}
