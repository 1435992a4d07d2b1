//! Pool — a named group of fuzzing nodes sharing OS, architecture, and
//! sizing constraints. Scalesets are created under a pool to satisfy its
//! requested capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fuzz_core::{Architecture, Os, PoolName, PoolState, Region, UpdateKind};
use fuzzgrid_orm::{
    FieldKind, FieldSpec, FilterValue, KeyValue, OrmResult, QueryFilter, Record, RecordStore,
    WorkStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub name: PoolName,
    pub pool_id: Uuid,
    pub os: Os,
    pub arch: Architecture,
    /// Managed pools get their scalesets created by the orchestrator;
    /// unmanaged pools bring their own nodes.
    pub managed: bool,
    pub vm_sku: String,
    pub image: String,
    pub region: Region,
    /// Upper bound on nodes across all of this pool's scalesets.
    pub max_size: u64,
    pub spot_instances: bool,
    pub state: PoolState,
    pub etag: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Pool {
    pub fn new(
        name: PoolName,
        os: Os,
        arch: Architecture,
        vm_sku: impl Into<String>,
        image: impl Into<String>,
        region: Region,
        max_size: u64,
    ) -> Self {
        Self {
            name,
            pool_id: Uuid::new_v4(),
            os,
            arch,
            managed: true,
            vm_sku: vm_sku.into(),
            image: image.into(),
            region,
            max_size,
            spot_instances: false,
            state: PoolState::Init,
            etag: None,
            timestamp: None,
        }
    }

    pub fn get_by_name(store: &RecordStore, name: &PoolName) -> OrmResult<Option<Pool>> {
        store.get(name, None)
    }

    /// Pools currently in one of the given states.
    pub fn search_states(store: &RecordStore, states: &[PoolState]) -> OrmResult<Vec<Pool>> {
        let query = QueryFilter::from([(
            "state".to_string(),
            states.iter().map(|s| FilterValue::state(*s)).collect(),
        )]);
        store.search(Some(&query), None, None)
    }
}

impl Record for Pool {
    fn table_name() -> &'static str {
        "Pool"
    }

    fn key_fields() -> (&'static str, Option<&'static str>) {
        ("name", None)
    }

    fn schema() -> &'static [FieldSpec] {
        const SCHEMA: &[FieldSpec] = &[
            FieldSpec::new("name", FieldKind::Primitive),
            FieldSpec::new("pool_id", FieldKind::Primitive),
            FieldSpec::new("os", FieldKind::Primitive),
            FieldSpec::new("arch", FieldKind::Primitive),
            FieldSpec::new("managed", FieldKind::Blob),
            FieldSpec::new("vm_sku", FieldKind::Primitive),
            FieldSpec::new("image", FieldKind::Primitive),
            FieldSpec::new("region", FieldKind::Primitive),
            FieldSpec::new("max_size", FieldKind::Int),
            FieldSpec::new("spot_instances", FieldKind::Blob),
            FieldSpec::new("state", FieldKind::Primitive),
            FieldSpec::new("etag", FieldKind::Primitive),
            FieldSpec::new("Timestamp", FieldKind::Timestamp),
        ];
        SCHEMA
    }

    fn keys(&self) -> (KeyValue, KeyValue) {
        ((&self.name).into(), (&self.name).into())
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }

    fn event_include() -> &'static [&'static str] {
        &["name", "pool_id", "os", "state"]
    }

    fn update_kind() -> Option<UpdateKind> {
        Some(UpdateKind::Pool)
    }

    fn work_status(&self) -> Option<WorkStatus> {
        Some(WorkStatus::of(self.state))
    }
}
