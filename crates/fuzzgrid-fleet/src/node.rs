//! Node — a single VM executing fuzzing work, tracked per pool. Nodes
//! report heartbeats while alive; the orchestrator drives done/shutdown
//! nodes back through reimage or teardown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fuzz_core::{NodeState, PoolName, TelemetryKind, UpdateKind};
use fuzzgrid_orm::{
    FieldKind, FieldSpec, FilterValue, KeyValue, OrmResult, QueryFilter, Record, RecordStore,
    TelemetrySpec, WorkStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub pool_name: PoolName,
    pub machine_id: Uuid,
    /// Absent for unmanaged nodes that joined on their own.
    pub scaleset_id: Option<Uuid>,
    pub state: NodeState,
    pub version: String,
    pub heartbeat: Option<DateTime<Utc>>,
    pub reimage_requested: bool,
    pub delete_requested: bool,
    pub etag: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(pool_name: PoolName, machine_id: Uuid, version: impl Into<String>) -> Self {
        Self {
            pool_name,
            machine_id,
            scaleset_id: None,
            state: NodeState::Init,
            version: version.into(),
            heartbeat: None,
            reimage_requested: false,
            delete_requested: false,
            etag: None,
            timestamp: None,
        }
    }

    /// Nodes in one of the given states, optionally narrowed to a pool
    /// and/or a scaleset.
    pub fn search_states(
        store: &RecordStore,
        pool_name: Option<&PoolName>,
        scaleset_id: Option<Uuid>,
        states: &[NodeState],
    ) -> OrmResult<Vec<Node>> {
        let mut query = QueryFilter::new();
        if !states.is_empty() {
            query.insert(
                "state".to_string(),
                states.iter().map(|s| FilterValue::state(*s)).collect(),
            );
        }
        if let Some(pool_name) = pool_name {
            query.insert("pool_name".to_string(), vec![FilterValue::from(pool_name)]);
        }
        if let Some(scaleset_id) = scaleset_id {
            query.insert(
                "scaleset_id".to_string(),
                vec![FilterValue::from(scaleset_id)],
            );
        }
        store.search(Some(&query), None, None)
    }
}

impl Record for Node {
    fn table_name() -> &'static str {
        "Node"
    }

    fn key_fields() -> (&'static str, Option<&'static str>) {
        ("pool_name", Some("machine_id"))
    }

    fn schema() -> &'static [FieldSpec] {
        const SCHEMA: &[FieldSpec] = &[
            FieldSpec::new("pool_name", FieldKind::Primitive),
            FieldSpec::new("machine_id", FieldKind::Primitive),
            FieldSpec::new("scaleset_id", FieldKind::Primitive),
            FieldSpec::new("state", FieldKind::Primitive),
            FieldSpec::new("version", FieldKind::Primitive),
            FieldSpec::new("heartbeat", FieldKind::Timestamp),
            FieldSpec::new("reimage_requested", FieldKind::Blob),
            FieldSpec::new("delete_requested", FieldKind::Blob),
            FieldSpec::new("etag", FieldKind::Primitive),
            FieldSpec::new("Timestamp", FieldKind::Timestamp),
        ];
        SCHEMA
    }

    fn keys(&self) -> (KeyValue, KeyValue) {
        ((&self.pool_name).into(), self.machine_id.into())
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }

    fn event_include() -> &'static [&'static str] {
        &["pool_name", "machine_id", "state"]
    }

    fn telemetry_spec() -> Option<TelemetrySpec> {
        Some(TelemetrySpec {
            event: TelemetryKind::Node,
            include: &["machine_id", "state", "version"],
        })
    }

    fn update_kind() -> Option<UpdateKind> {
        Some(UpdateKind::Node)
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

    fn test_node(pool: &str, state: NodeState) -> Node {
        let mut node = Node::new(
            PoolName::new(pool).unwrap(),
            Uuid::new_v4(),
            "1.4.0",
        );
        node.state = state;
        node
    }

    #[test]
    fn heartbeat_round_trips_as_native_timestamp() {
        use chrono::TimeZone;

        let store = store();
        let mut node = test_node("linux-asan", NodeState::Busy);
        node.heartbeat = Some(Utc.with_ymd_and_hms(2026, 8, 7, 11, 0, 0).unwrap());
        let original = node.clone();
        store.save(&mut node, SaveMode::New).unwrap();

        let mut loaded: Node = store
            .get(&original.pool_name, Some(original.machine_id.into()))
            .unwrap()
            .expect("node should exist");
        loaded.etag = None;
        loaded.timestamp = None;
        assert_eq!(loaded, original);
    }

    #[test]
    fn search_narrows_by_pool_and_scaleset() {
        let store = store();
        let scaleset_id = Uuid::new_v4();

        let mut member = test_node("p1", NodeState::Free);
        member.scaleset_id = Some(scaleset_id);
        store.save(&mut member, SaveMode::New).unwrap();

        let mut loner = test_node("p1", NodeState::Free);
        store.save(&mut loner, SaveMode::New).unwrap();

        let mut other_pool = test_node("p2", NodeState::Free);
        other_pool.scaleset_id = Some(scaleset_id);
        store.save(&mut other_pool, SaveMode::New).unwrap();

        let pool = PoolName::new("p1").unwrap();
        let found = Node::search_states(
            &store,
            Some(&pool),
            Some(scaleset_id),
            &[NodeState::Free],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].machine_id, member.machine_id);

        let free_in_pool =
            Node::search_states(&store, Some(&pool), None, &[NodeState::Free]).unwrap();
        assert_eq!(free_in_pool.len(), 2);
    }
}
