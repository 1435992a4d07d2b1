//! fuzz-core — shared types for the FuzzGrid fleet.
//!
//! Validated name newtypes, per-entity lifecycle state enums with their
//! pending-work classification, and the update/telemetry catalogs. This
//! crate does no I/O; everything here is plain data shared by the
//! persistence layer and the control loops built on top of it.

pub mod primitives;
pub mod states;
pub mod update;

pub use primitives::{Architecture, Container, InvalidName, Os, PoolName, Region};
pub use states::{FleetState, JobState, NodeState, PoolState, ScalesetState, TaskState};
pub use update::{TelemetryKind, UpdateKind};
