//! fuzzgrid-orm — typed record mapping over a partitioned table store.
//!
//! The persistence core of the FuzzGrid fleet: every stateful entity
//! (pools, scalesets, nodes, tasks, jobs) is a [`Record`] persisted
//! through a [`RecordStore`].
//!
//! # Architecture
//!
//! A record's declared partition/row key fields resolve to the row's
//! string identity through [`KeyValue`]; nested values travel as JSON
//! string blobs per the record's static field schema. Saves go through
//! the store's optimistic concurrency token, and every successful save
//! triggers the state-driven update dispatcher plus the dashboard and
//! telemetry projections. Queries are compiled into a server-side
//! expression over provably safe values, with everything else evaluated
//! client-side.
//!
//! The table store, update queue, and event/telemetry channels are
//! injected as trait objects at construction; [`backend::RedbTableClient`]
//! is an embedded implementation of the table seam (on-disk or in-memory).

pub mod backend;
pub mod error;
pub mod expr;
pub mod filter;
pub mod keys;
pub mod record;
pub mod sinks;
pub mod store;
pub mod table;

pub use backend::RedbTableClient;
pub use error::{OrmError, OrmResult, TableError};
pub use filter::{FilterValue, QueryFilter, build_filters, post_filter};
pub use keys::KeyValue;
pub use record::{FieldKind, FieldSpec, Record, TelemetrySpec, WorkStatus};
pub use sinks::{EventSink, NullEventSink, NullQueue, NullTelemetry, TelemetrySink, UpdateQueue};
pub use store::{
    QUEUE_DELAY_PENDING, QUEUE_DELAY_STOPPING, RecordStore, SaveMode, load_record,
};
pub use table::{TableClient, WireRow, columns};
