//! Job — a group of related tasks sharing a project/build context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fuzz_core::{JobState, UpdateKind};
use fuzzgrid_orm::{
    FieldKind, FieldSpec, FilterValue, KeyValue, OrmResult, QueryFilter, Record, RecordStore,
    WorkStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub project: String,
    pub name: String,
    pub build: String,
    pub duration_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub state: JobState,
    pub config: JobConfig,
    pub error: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            state: JobState::Init,
            config,
            error: None,
            end_time: None,
            etag: None,
            timestamp: None,
        }
    }

    pub fn get(store: &RecordStore, job_id: Uuid) -> OrmResult<Option<Job>> {
        store.get(job_id, None)
    }

    /// Jobs currently in one of the given states.
    pub fn search_states(store: &RecordStore, states: &[JobState]) -> OrmResult<Vec<Job>> {
        let query = QueryFilter::from([(
            "state".to_string(),
            states.iter().map(|s| FilterValue::state(*s)).collect(),
        )]);
        store.search(Some(&query), None, None)
    }
}

impl Record for Job {
    fn table_name() -> &'static str {
        "Job"
    }

    fn key_fields() -> (&'static str, Option<&'static str>) {
        ("job_id", None)
    }

    fn schema() -> &'static [FieldSpec] {
        const SCHEMA: &[FieldSpec] = &[
            FieldSpec::new("job_id", FieldKind::Primitive),
            FieldSpec::new("state", FieldKind::Primitive),
            FieldSpec::new("config", FieldKind::Blob),
            FieldSpec::new("error", FieldKind::Primitive),
            FieldSpec::new("end_time", FieldKind::Timestamp),
            FieldSpec::new("etag", FieldKind::Primitive),
            FieldSpec::new("Timestamp", FieldKind::Timestamp),
        ];
        SCHEMA
    }

    fn keys(&self) -> (KeyValue, KeyValue) {
        (self.job_id.into(), self.job_id.into())
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }

    fn event_include() -> &'static [&'static str] {
        &["job_id", "state"]
    }

    fn update_kind() -> Option<UpdateKind> {
        Some(UpdateKind::Job)
    }

    fn work_status(&self) -> Option<WorkStatus> {
        Some(WorkStatus::of(self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fuzzgrid_orm::{
        NullEventSink, NullQueue, NullTelemetry, RedbTableClient, SaveMode,
    };

    fn store() -> RecordStore {
        RecordStore::new(
            Arc::new(RedbTableClient::open_in_memory().unwrap()),
            Arc::new(NullQueue),
            Arc::new(NullEventSink),
            Arc::new(NullTelemetry),
        )
    }

    fn test_job() -> Job {
        Job::new(JobConfig {
            project: "browser".to_string(),
            name: "pdf-parser".to_string(),
            build: "20260807.1".to_string(),
            duration_hours: 48,
        })
    }

    #[test]
    fn round_trips_with_single_key_field() {
        let store = store();
        let mut job = test_job();
        let original = job.clone();
        store.save(&mut job, SaveMode::New).unwrap();

        let mut loaded = Job::get(&store, original.job_id)
            .unwrap()
            .expect("job should exist");
        loaded.etag = None;
        loaded.timestamp = None;
        assert_eq!(loaded, original);
    }

    #[test]
    fn search_states_finds_stopping_jobs() {
        let store = store();
        let mut stopping = test_job();
        stopping.state = JobState::Stopping;
        store.save(&mut stopping, SaveMode::New).unwrap();

        let mut enabled = test_job();
        enabled.state = JobState::Enabled;
        store.save(&mut enabled, SaveMode::New).unwrap();

        let found = Job::search_states(&store, &[JobState::Stopping]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].job_id, stopping.job_id);
    }
}
