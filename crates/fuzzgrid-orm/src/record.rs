//! The `Record` trait and the static per-type field schema.
//!
//! Every persistable entity declares, once, how each of its fields maps
//! onto the wire row: plain primitives pass through, nested structures are
//! carried as JSON string blobs, and timestamp fields keep their native
//! representation. The schema is a static table, so the save/load paths
//! never inspect values to decide how to encode them.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::keys::KeyValue;
use fuzz_core::{FleetState, TelemetryKind, UpdateKind};

/// How a declared field is carried on the wire row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// String-shaped scalar (strings, UUIDs, enum symbols). Stored as-is.
    Primitive,
    /// Integer scalar. Stored as a number column; key columns of this kind
    /// are re-parsed from their string form on load.
    Int,
    /// Timestamp. Carried natively (RFC 3339 column), never blob-encoded.
    Timestamp,
    /// Nested structure or mapping. JSON-encoded into a string column and
    /// decoded back on load.
    Blob,
}

/// One entry of a record type's field schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Look up a field's kind in a schema table.
pub fn field_kind(schema: &[FieldSpec], name: &str) -> Option<FieldKind> {
    schema.iter().find(|spec| spec.name == name).map(|spec| spec.kind)
}

/// Work-state snapshot of a record, for the update dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkStatus {
    /// The current state still has orchestration work pending.
    pub needs_work: bool,
    /// The current state is a shutdown-type transition (longer re-queue delay).
    pub stopping: bool,
}

impl WorkStatus {
    pub fn of<S: FleetState>(state: S) -> Self {
        Self {
            needs_work: state.needs_work(),
            stopping: state.is_stopping(),
        }
    }
}

/// Telemetry capability declaration for a record type.
#[derive(Debug, Clone, Copy)]
pub struct TelemetrySpec {
    /// Stream the projection is recorded on.
    pub event: TelemetryKind,
    /// Fields included in the telemetry projection.
    pub include: &'static [&'static str],
}

/// A persistable entity.
///
/// The key-field pair is fixed per type; once resolved to strings the keys
/// are the row's immutable identity. `work_status`/`update_kind` and
/// `telemetry_spec` are opt-in capabilities: types that do not declare them
/// never touch the update queue or the telemetry channel.
pub trait Record: Serialize + DeserializeOwned {
    /// Table this record type persists to.
    fn table_name() -> &'static str;

    /// Partition key field, and row key field if distinct from it.
    fn key_fields() -> (&'static str, Option<&'static str>);

    /// Static field schema.
    fn schema() -> &'static [FieldSpec];

    /// Typed key values of this instance.
    fn keys(&self) -> (KeyValue, KeyValue);

    /// Concurrency token from the last successful write.
    fn etag(&self) -> Option<&str>;

    fn set_etag(&mut self, etag: String);

    /// Fields excluded from persistence.
    fn save_exclude() -> &'static [&'static str] {
        &[]
    }

    /// Fields included in the dashboard event projection.
    fn event_include() -> &'static [&'static str] {
        &[]
    }

    /// Telemetry capability, if this type participates.
    fn telemetry_spec() -> Option<TelemetrySpec> {
        None
    }

    /// Update routing for queued follow-ups. Must be declared for every
    /// type that declares a work status.
    fn update_kind() -> Option<UpdateKind> {
        None
    }

    /// Current work-state classification, if this type participates in
    /// state-driven dispatch.
    fn work_status(&self) -> Option<WorkStatus> {
        None
    }
}
