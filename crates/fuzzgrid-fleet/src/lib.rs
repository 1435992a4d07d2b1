//! fuzzgrid-fleet — the stateful entities of the FuzzGrid fleet.
//!
//! Pools, scalesets, nodes, tasks, and jobs, each persisted through
//! [`fuzzgrid_orm::RecordStore`]. Every entity declares its key-field
//! pair, field schema, and event projection here; the queueable ones
//! (all of them) also declare their work-state and update routing, so a
//! save in a pending state automatically re-queues processing.
//!
//! The typed search helpers on each entity are what the orchestrator's
//! control loops (resize timer, scheduler) consume.

pub mod job;
pub mod node;
pub mod pool;
pub mod scaleset;
pub mod task;

pub use job::{Job, JobConfig};
pub use node::Node;
pub use pool::Pool;
pub use scaleset::Scaleset;
pub use task::{Task, TaskConfig, TaskPool, TaskTarget};
