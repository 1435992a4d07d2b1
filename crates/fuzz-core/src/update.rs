//! Update and telemetry catalogs.
//!
//! `UpdateKind` routes a queued follow-up to the subsystem that processes
//! the matching entity. `TelemetryKind` names the metric streams entities
//! can opt into.

use serde::{Deserialize, Serialize};

/// Which entity a queued update message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Pool,
    Scaleset,
    Node,
    Task,
    Job,
}

impl UpdateKind {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateKind::Pool => "pool",
            UpdateKind::Scaleset => "scaleset",
            UpdateKind::Node => "node",
            UpdateKind::Task => "task",
            UpdateKind::Job => "job",
        }
    }
}

/// Telemetry event streams an entity type can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Task,
    Node,
}

impl TelemetryKind {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryKind::Task => "task",
            TelemetryKind::Node => "node",
        }
    }
}
