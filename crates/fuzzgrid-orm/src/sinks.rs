//! Side-effect seams fed by the record engine.
//!
//! The engine is handed these at construction time; lifecycle of the real
//! implementations (queue service, dashboard push channel, telemetry
//! backend) belongs to the hosting process. The `Null*` implementations
//! are for hosts without the matching channel, and for tests.

use std::time::Duration;

use serde_json::Value;

use fuzz_core::{TelemetryKind, UpdateKind};

/// Follow-up work queue. Delivery is at-least-once with a visibility
/// delay; consumers must tolerate redelivery and stale state.
pub trait UpdateQueue: Send + Sync {
    fn queue_update(
        &self,
        update: UpdateKind,
        partition_key: String,
        row_key: String,
        method: Option<String>,
        visibility_delay: Option<Duration>,
    ) -> anyhow::Result<()>;
}

/// Dashboard event channel.
pub trait EventSink: Send + Sync {
    fn publish(&self, table: &str, payload: Value);
}

/// Metrics/telemetry channel.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryKind, payload: Value);
}

/// Queue that drops all updates.
pub struct NullQueue;

impl UpdateQueue for NullQueue {
    fn queue_update(
        &self,
        _update: UpdateKind,
        _partition_key: String,
        _row_key: String,
        _method: Option<String>,
        _visibility_delay: Option<Duration>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Event sink that discards all events.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _table: &str, _payload: Value) {}
}

/// Telemetry sink that discards all events.
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&self, _event: TelemetryKind, _payload: Value) {}
}
