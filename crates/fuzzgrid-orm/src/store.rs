//! RecordStore — the record-mapping engine.
//!
//! Loads typed records from wire rows, saves them back with optimistic
//! concurrency, deletes idempotently, and searches with compiled filters.
//! Every successful save also runs the state-triggered dispatcher (queue a
//! follow-up when the record's work-state is pending) and feeds the
//! dashboard/telemetry sinks a filtered projection of the record.
//!
//! There is no in-process locking: correctness under concurrent writers
//! rests entirely on the store's per-row concurrency token. Callers doing
//! read-modify-write must re-fetch after a conflict; the engine never
//! retries on its own.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{OrmError, OrmResult, TableError};
use crate::filter::{QueryFilter, build_filters, post_filter};
use crate::keys::KeyValue;
use crate::record::{FieldKind, Record, field_kind};
use crate::sinks::{EventSink, TelemetrySink, UpdateQueue};
use crate::table::{TableClient, WireRow, columns};

/// Visibility delay for stopping-category states: long enough for
/// in-flight work to settle before the update is picked up.
pub const QUEUE_DELAY_STOPPING: Duration = Duration::from_secs(30);

/// Visibility delay for all other pending states.
pub const QUEUE_DELAY_PENDING: Duration = Duration::from_secs(5);

/// How a save is dispatched to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Insert a fresh record; fails with `OrmError::RowExists` if the key
    /// is taken.
    New,
    /// Conditional replace keyed on the record's concurrency token; a
    /// stale token is `OrmError::EtagMismatch`. Records never saved yet
    /// (no token) fall back to an upsert.
    RequireEtag,
    /// Unconditional insert-or-replace.
    Upsert,
}

/// The record engine. All collaborators are injected at construction;
/// their lifecycle belongs to the hosting process.
#[derive(Clone)]
pub struct RecordStore {
    table: Arc<dyn TableClient>,
    queue: Arc<dyn UpdateQueue>,
    events: Arc<dyn EventSink>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl RecordStore {
    pub fn new(
        table: Arc<dyn TableClient>,
        queue: Arc<dyn UpdateQueue>,
        events: Arc<dyn EventSink>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            table,
            queue,
            events,
            telemetry,
        }
    }

    // ── Read path ──────────────────────────────────────────────────

    /// Point lookup. The row key defaults to the partition key. An absent
    /// row is `Ok(None)`; any other store failure propagates.
    pub fn get<R: Record>(
        &self,
        partition_key: impl Into<KeyValue>,
        row_key: Option<KeyValue>,
    ) -> OrmResult<Option<R>> {
        let partition_key = partition_key.into().resolve();
        let row_key = match row_key {
            Some(key) => key.resolve(),
            None => partition_key.clone(),
        };

        match self
            .table
            .get_entity(R::table_name(), &partition_key, &row_key)
        {
            Ok(row) => Ok(Some(load_record(row)?)),
            Err(TableError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Search with a compiled query, optionally AND-combined with a raw
    /// unchecked server expression. Rows failing the residual client-side
    /// filter are dropped before decoding.
    pub fn search<R: Record>(
        &self,
        query: Option<&QueryFilter>,
        raw_filter: Option<&str>,
        limit: Option<usize>,
    ) -> OrmResult<Vec<R>> {
        let (compiled, residual) = match query {
            Some(q) => build_filters::<R>(q)?,
            None => (None, QueryFilter::new()),
        };

        let server_filter = match (compiled, raw_filter) {
            (Some(compiled), Some(raw)) => Some(format!("({compiled}) and ({raw})")),
            (None, Some(raw)) => Some(raw.to_string()),
            (compiled, None) => compiled,
        };

        let rows = self
            .table
            .query_entities(R::table_name(), server_filter.as_deref(), limit)?;

        let mut records = Vec::new();
        for row in rows {
            if !post_filter(&row, &residual) {
                debug!(table = R::table_name(), "row dropped by post-filter");
                continue;
            }
            records.push(load_record(row)?);
        }
        Ok(records)
    }

    // ── Write path ─────────────────────────────────────────────────

    /// Persist a record. On success the record adopts the store-assigned
    /// concurrency token, then the update dispatcher and the event/
    /// telemetry sinks run; their failures propagate, but the row is
    /// already durably written by then.
    pub fn save<R: Record>(&self, record: &mut R, mode: SaveMode) -> OrmResult<()> {
        let mut row = serialize_record(record, R::save_exclude())?;

        // Non-primitive fields become JSON string blobs; timestamp fields
        // keep their native column representation.
        for spec in R::schema() {
            if spec.kind != FieldKind::Blob {
                continue;
            }
            if let Some(value) = row.remove(spec.name) {
                row.insert(
                    spec.name.to_string(),
                    Value::String(serde_json::to_string(&value)?),
                );
            }
        }

        // Key columns are derived from the domain key fields, which are
        // then removed: key values must never appear twice on the wire.
        let (partition_key_field, row_key_field) = R::key_fields();
        let partition_key = resolve_key_field(&row, partition_key_field, R::table_name())?;
        let row_key = match row_key_field {
            Some(field) => resolve_key_field(&row, field, R::table_name())?,
            None => partition_key.clone(),
        };
        row.remove(partition_key_field);
        if let Some(field) = row_key_field {
            row.remove(field);
        }

        // Store-assigned columns are never written.
        row.remove(columns::TIMESTAMP);
        row.remove(columns::ETAG);

        row.insert(
            columns::PARTITION_KEY.to_string(),
            Value::String(partition_key.clone()),
        );
        row.insert(columns::ROW_KEY.to_string(), Value::String(row_key.clone()));

        let table = R::table_name();
        let etag = match mode {
            SaveMode::New => self.table.insert_entity(table, &row).map_err(|e| match e {
                TableError::Conflict => OrmError::RowExists {
                    table,
                    partition_key: partition_key.clone(),
                    row_key: row_key.clone(),
                },
                other => other.into(),
            })?,
            SaveMode::RequireEtag => match record.etag() {
                Some(current) => {
                    self.table
                        .replace_entity(table, &row, current)
                        .map_err(|e| match e {
                            TableError::Conflict => OrmError::EtagMismatch {
                                table,
                                partition_key: partition_key.clone(),
                                row_key: row_key.clone(),
                            },
                            other => other.into(),
                        })?
                }
                None => self.table.upsert_entity(table, &row)?,
            },
            SaveMode::Upsert => self.table.upsert_entity(table, &row)?,
        };

        record.set_etag(etag);
        debug!(table, %partition_key, %row_key, "record saved");

        self.queue_as_needed(record, &partition_key, &row_key)?;
        self.telemetry_as_needed(record);
        self.event_as_needed(record);
        Ok(())
    }

    /// Delete a record's row. The dashboard event fires first so
    /// subscribers can react to the removal; deleting an already-absent
    /// row is not an error.
    pub fn delete<R: Record>(&self, record: &R) -> OrmResult<()> {
        self.event_as_needed(record);

        let (partition_key, row_key) = record.keys();
        let partition_key = partition_key.resolve();
        let row_key = row_key.resolve();

        match self
            .table
            .delete_entity(R::table_name(), &partition_key, &row_key)
        {
            Ok(()) | Err(TableError::NotFound) => {
                debug!(table = R::table_name(), %partition_key, %row_key, "record deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── State-triggered dispatch ───────────────────────────────────

    /// Queue a follow-up update for a record, with an optional method name
    /// and visibility delay.
    pub fn queue_update<R: Record>(
        &self,
        record: &R,
        method: Option<String>,
        visibility_delay: Option<Duration>,
    ) -> OrmResult<()> {
        let (partition_key, row_key) = record.keys();
        self.dispatch_update::<R>(
            &partition_key.resolve(),
            &row_key.resolve(),
            method,
            visibility_delay,
        )
    }

    fn queue_as_needed<R: Record>(
        &self,
        record: &R,
        partition_key: &str,
        row_key: &str,
    ) -> OrmResult<()> {
        let Some(status) = record.work_status() else {
            return Ok(());
        };
        if !status.needs_work {
            return Ok(());
        }
        let delay = if status.stopping {
            QUEUE_DELAY_STOPPING
        } else {
            QUEUE_DELAY_PENDING
        };
        self.dispatch_update::<R>(partition_key, row_key, None, Some(delay))
    }

    fn dispatch_update<R: Record>(
        &self,
        partition_key: &str,
        row_key: &str,
        method: Option<String>,
        visibility_delay: Option<Duration>,
    ) -> OrmResult<()> {
        // A queueable type without update routing would silently drop
        // work; that is a declaration bug, not a runtime condition.
        let kind = R::update_kind().ok_or_else(|| {
            OrmError::Schema(format!(
                "no update kind declared for table {}",
                R::table_name()
            ))
        })?;

        self.queue
            .queue_update(
                kind,
                partition_key.to_string(),
                row_key.to_string(),
                method,
                visibility_delay,
            )
            .map_err(OrmError::Queue)?;
        debug!(table = R::table_name(), %partition_key, %row_key, ?visibility_delay, "update queued");
        Ok(())
    }

    // ── Event/telemetry projection ─────────────────────────────────

    fn event_as_needed<R: Record>(&self, record: &R) {
        if let Some(payload) = projection(record, R::event_include()) {
            self.events.publish(R::table_name(), Value::Object(payload));
        }
    }

    fn telemetry_as_needed<R: Record>(&self, record: &R) {
        let Some(spec) = R::telemetry_spec() else {
            return;
        };
        if let Some(payload) = projection(record, spec.include) {
            self.telemetry.record(spec.event, Value::Object(payload));
        }
    }
}

/// Reconstruct a typed record from a wire row.
///
/// The store's key columns move back into the declared domain key fields;
/// a row that already carries a domain key field is structurally broken.
/// Blob fields are decoded from their JSON string columns.
pub fn load_record<R: Record>(mut row: WireRow) -> OrmResult<R> {
    let (partition_key_field, row_key_field) = R::key_fields();
    let table = R::table_name();

    if row.contains_key(partition_key_field) {
        return Err(OrmError::Schema(format!(
            "duplicate partition key field {partition_key_field} for {table}"
        )));
    }
    if let Some(field) = row_key_field {
        if row.contains_key(field) {
            return Err(OrmError::Schema(format!(
                "duplicate row key field {field} for {table}"
            )));
        }
    }

    let partition_key = row
        .remove(columns::PARTITION_KEY)
        .ok_or_else(|| OrmError::Schema(format!("row for {table} missing PartitionKey")))?;
    let row_key = row
        .remove(columns::ROW_KEY)
        .ok_or_else(|| OrmError::Schema(format!("row for {table} missing RowKey")))?;

    row.insert(
        partition_key_field.to_string(),
        rehydrate_key::<R>(partition_key_field, partition_key)?,
    );
    if let Some(field) = row_key_field {
        row.insert(field.to_string(), rehydrate_key::<R>(field, row_key)?);
    }

    for spec in R::schema() {
        if spec.kind != FieldKind::Blob {
            continue;
        }
        let decoded = match row.get(spec.name) {
            Some(Value::String(blob)) => serde_json::from_str::<Value>(blob)?,
            _ => continue,
        };
        row.insert(spec.name.to_string(), decoded);
    }

    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Key columns are strings on the wire; integer-keyed fields are parsed
/// back to numbers so typed decoding sees the declared shape.
fn rehydrate_key<R: Record>(field: &str, raw: Value) -> OrmResult<Value> {
    match field_kind(R::schema(), field) {
        Some(FieldKind::Int) => match &raw {
            Value::String(s) => {
                let parsed: i64 = s.parse().map_err(|_| {
                    OrmError::Schema(format!(
                        "key column {field} for {} is not an integer: {s:?}",
                        R::table_name()
                    ))
                })?;
                Ok(Value::Number(parsed.into()))
            }
            _ => Ok(raw),
        },
        _ => Ok(raw),
    }
}

/// Derive a string table key from a serialized key field, through the
/// shared resolver policy.
fn resolve_key_field(row: &WireRow, field: &str, table: &'static str) -> OrmResult<String> {
    let value = row.get(field).ok_or_else(|| {
        OrmError::Schema(format!("record for {table} is missing key field {field}"))
    })?;
    Ok(KeyValue::from_wire(value)?.resolve())
}

fn serialize_record<R: Record>(record: &R, exclude: &[&str]) -> OrmResult<WireRow> {
    let value = serde_json::to_value(record)?;
    let Value::Object(mut map) = value else {
        return Err(OrmError::Schema(format!(
            "record for {} did not serialize to an object",
            R::table_name()
        )));
    };
    map.retain(|key, value| !value.is_null() && !exclude.contains(&key.as_str()));
    Ok(map)
}

/// Filtered projection of a record for the dashboard/telemetry channels:
/// declared fields only, empty values dropped. `None` when nothing is left.
fn projection<R: Record>(record: &R, include: &[&str]) -> Option<WireRow> {
    if include.is_empty() {
        return None;
    }
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            warn!(table = R::table_name(), error = %e, "event projection failed");
            return None;
        }
    };
    let Value::Object(mut map) = value else {
        return None;
    };
    map.retain(|key, value| !value.is_null() && include.contains(&key.as_str()));
    if map.is_empty() { None } else { Some(map) }
}
