//! Scaleset — a block of identical VMs belonging to a pool. The resize
//! loop grows and shrinks scalesets to match the pool's requested
//! capacity; `new_size` carries the pending target while a resize is in
//! flight.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fuzz_core::{PoolName, Region, ScalesetState, UpdateKind};
use fuzzgrid_orm::{
    FieldKind, FieldSpec, FilterValue, KeyValue, OrmResult, QueryFilter, Record, RecordStore,
    WorkStatus,
};

/// Hard cap a single scaleset can grow to.
pub const MAX_SCALESET_SIZE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaleset {
    pub pool_name: PoolName,
    pub scaleset_id: Uuid,
    pub state: ScalesetState,
    pub vm_sku: String,
    pub image: String,
    pub region: Region,
    pub size: u64,
    /// Target size of an in-flight resize.
    pub new_size: Option<u64>,
    pub spot_instances: bool,
    pub tags: HashMap<String, String>,
    pub error: Option<String>,
    pub etag: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Scaleset {
    pub fn new(
        pool_name: PoolName,
        vm_sku: impl Into<String>,
        image: impl Into<String>,
        region: Region,
        size: u64,
    ) -> Self {
        Self {
            pool_name,
            scaleset_id: Uuid::new_v4(),
            state: ScalesetState::Init,
            vm_sku: vm_sku.into(),
            image: image.into(),
            region,
            size,
            new_size: None,
            spot_instances: false,
            tags: HashMap::new(),
            error: None,
            etag: None,
            timestamp: None,
        }
    }

    /// All scalesets belonging to a pool.
    pub fn search_by_pool(store: &RecordStore, pool_name: &PoolName) -> OrmResult<Vec<Scaleset>> {
        let query = QueryFilter::from([(
            "pool_name".to_string(),
            vec![FilterValue::from(pool_name)],
        )]);
        store.search(Some(&query), None, None)
    }

    /// Scalesets currently in one of the given states.
    pub fn search_states(
        store: &RecordStore,
        states: &[ScalesetState],
    ) -> OrmResult<Vec<Scaleset>> {
        let query = QueryFilter::from([(
            "state".to_string(),
            states.iter().map(|s| FilterValue::state(*s)).collect(),
        )]);
        store.search(Some(&query), None, None)
    }
}

impl Record for Scaleset {
    fn table_name() -> &'static str {
        "Scaleset"
    }

    fn key_fields() -> (&'static str, Option<&'static str>) {
        ("pool_name", Some("scaleset_id"))
    }

    fn schema() -> &'static [FieldSpec] {
        const SCHEMA: &[FieldSpec] = &[
            FieldSpec::new("pool_name", FieldKind::Primitive),
            FieldSpec::new("scaleset_id", FieldKind::Primitive),
            FieldSpec::new("state", FieldKind::Primitive),
            FieldSpec::new("vm_sku", FieldKind::Primitive),
            FieldSpec::new("image", FieldKind::Primitive),
            FieldSpec::new("region", FieldKind::Primitive),
            FieldSpec::new("size", FieldKind::Int),
            FieldSpec::new("new_size", FieldKind::Int),
            FieldSpec::new("spot_instances", FieldKind::Blob),
            FieldSpec::new("tags", FieldKind::Blob),
            FieldSpec::new("error", FieldKind::Primitive),
            FieldSpec::new("etag", FieldKind::Primitive),
            FieldSpec::new("Timestamp", FieldKind::Timestamp),
        ];
        SCHEMA
    }

    fn keys(&self) -> (KeyValue, KeyValue) {
        ((&self.pool_name).into(), self.scaleset_id.into())
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }

    fn event_include() -> &'static [&'static str] {
        &["pool_name", "scaleset_id", "state", "size"]
    }

    fn update_kind() -> Option<UpdateKind> {
        Some(UpdateKind::Scaleset)
    }

    fn work_status(&self) -> Option<WorkStatus> {
        Some(WorkStatus::of(self.state))
    }
}
