//! Task — one fuzzing target running under a job, bound to a pool with a
//! requested node count. The task's configuration is a nested structure
//! carried as a blob column.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fuzz_core::{Container, PoolName, TaskState, TelemetryKind, UpdateKind};
use fuzzgrid_orm::{
    FieldKind, FieldSpec, FilterValue, KeyValue, OrmResult, QueryFilter, Record, RecordStore,
    TelemetrySpec, WorkStatus,
};

/// Pool binding of a task: which pool runs it and on how many nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPool {
    pub pool_name: PoolName,
    pub count: u64,
}

/// What the task actually executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTarget {
    pub exe: String,
    pub env: HashMap<String, String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub pool: TaskPool,
    pub target: TaskTarget,
    /// Containers holding the task's corpus and crash artifacts.
    pub containers: Vec<Container>,
    pub duration_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub job_id: Uuid,
    pub task_id: Uuid,
    pub state: TaskState,
    pub config: TaskConfig,
    pub error: Option<String>,
    pub heartbeat: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(job_id: Uuid, config: TaskConfig) -> Self {
        Self {
            job_id,
            task_id: Uuid::new_v4(),
            state: TaskState::Init,
            config,
            error: None,
            heartbeat: None,
            end_time: None,
            etag: None,
            timestamp: None,
        }
    }

    /// Tasks currently in one of the given states.
    pub fn search_states(store: &RecordStore, states: &[TaskState]) -> OrmResult<Vec<Task>> {
        let query = QueryFilter::from([(
            "state".to_string(),
            states.iter().map(|s| FilterValue::state(*s)).collect(),
        )]);
        store.search(Some(&query), None, None)
    }

    /// Tasks bound to a pool that still count against its capacity. The
    /// pool binding lives inside the config blob, so this narrows
    /// client-side after the state scan.
    pub fn get_tasks_by_pool_name(
        store: &RecordStore,
        pool_name: &PoolName,
    ) -> OrmResult<Vec<Task>> {
        let tasks: Vec<Task> = store.search(None, None, None)?;
        Ok(tasks
            .into_iter()
            .filter(|task| {
                task.state.consumes_nodes() && &task.config.pool.pool_name == pool_name
            })
            .collect())
    }
}

impl Record for Task {
    fn table_name() -> &'static str {
        "Task"
    }

    fn key_fields() -> (&'static str, Option<&'static str>) {
        ("job_id", Some("task_id"))
    }

    fn schema() -> &'static [FieldSpec] {
        const SCHEMA: &[FieldSpec] = &[
            FieldSpec::new("job_id", FieldKind::Primitive),
            FieldSpec::new("task_id", FieldKind::Primitive),
            FieldSpec::new("state", FieldKind::Primitive),
            FieldSpec::new("config", FieldKind::Blob),
            FieldSpec::new("error", FieldKind::Primitive),
            FieldSpec::new("heartbeat", FieldKind::Timestamp),
            FieldSpec::new("end_time", FieldKind::Timestamp),
            FieldSpec::new("etag", FieldKind::Primitive),
            FieldSpec::new("Timestamp", FieldKind::Timestamp),
        ];
        SCHEMA
    }

    fn keys(&self) -> (KeyValue, KeyValue) {
        (self.job_id.into(), self.task_id.into())
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }

    fn event_include() -> &'static [&'static str] {
        &["job_id", "task_id", "state"]
    }

    fn telemetry_spec() -> Option<TelemetrySpec> {
        Some(TelemetrySpec {
            event: TelemetryKind::Task,
            include: &["task_id", "state"],
        })
    }

    fn update_kind() -> Option<UpdateKind> {
        Some(UpdateKind::Task)
    }

    fn work_status(&self) -> Option<WorkStatus> {
        Some(WorkStatus::of(self.state))
    }
}
