//! Query filter compilation.
//!
//! A query is a set of field → allowed-values constraints. Compilation
//! splits it into a server-side boolean expression (exact-match clauses
//! over provably safe values) and a residual set evaluated client-side.
//! Free text never reaches the server expression, so nothing here ever
//! needs escaping.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::table::columns;
use fuzz_core::{Container, FleetState, PoolName, Region};

/// One allowed value in a query constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Integer; compiled to an unquoted server equality clause.
    Int(i64),
    /// Symbolic name of an enumerated value; compiled to a quoted clause.
    Symbol(&'static str),
    /// Safe string (UUIDs, validated names); compiled to a quoted clause.
    Name(String),
    /// Arbitrary free text; only ever evaluated client-side.
    Text(String),
}

impl FilterValue {
    /// Allowed value for an enumerated lifecycle state.
    pub fn state<S: FleetState>(state: S) -> FilterValue {
        FilterValue::Symbol(state.name())
    }

    fn server_clause(&self, field: &str) -> Option<String> {
        match self {
            FilterValue::Int(i) => Some(format!("{field} eq {i}")),
            FilterValue::Symbol(s) => Some(format!("{field} eq '{s}'")),
            FilterValue::Name(s) => Some(format!("{field} eq '{s}'")),
            FilterValue::Text(_) => None,
        }
    }

    /// Does a wire column value match this allowed value?
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Int(i), Value::Number(n)) => n.as_i64() == Some(*i),
            (FilterValue::Symbol(s), Value::String(v)) => v == s,
            (FilterValue::Name(s), Value::String(v)) => v == s,
            (FilterValue::Text(s), Value::String(v)) => v == s,
            _ => false,
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Name(value.to_string())
    }
}

impl From<&PoolName> for FilterValue {
    fn from(value: &PoolName) -> Self {
        FilterValue::Name(value.as_str().to_string())
    }
}

impl From<&Region> for FilterValue {
    fn from(value: &Region) -> Self {
        FilterValue::Name(value.as_str().to_string())
    }
}

impl From<&Container> for FilterValue {
    fn from(value: &Container) -> Self {
        FilterValue::Name(value.as_str().to_string())
    }
}

/// Field → allowed values. Ordered so compiled expressions are stable.
pub type QueryFilter = BTreeMap<String, Vec<FilterValue>>;

/// Split a query into a server-side expression and residual client-side
/// filters, keyed by the store-side field name.
pub fn build_filters<R: Record>(
    query: &QueryFilter,
) -> OrmResult<(Option<String>, QueryFilter)> {
    let (partition_key_field, row_key_field) = R::key_fields();

    let mut expression_parts = Vec::new();
    let mut post_filters = QueryFilter::new();

    for (field, values) in query {
        if !R::schema().iter().any(|spec| spec.name == field) {
            return Err(OrmError::UnknownField {
                table: R::table_name(),
                field: field.clone(),
            });
        }

        if values.is_empty() {
            continue;
        }

        let field_name = if field == partition_key_field {
            columns::PARTITION_KEY
        } else if Some(field.as_str()) == row_key_field {
            columns::ROW_KEY
        } else {
            field.as_str()
        };

        // A field group goes server-side only when every value is provably
        // safe and of one shape; anything else is evaluated client-side.
        let uniform = values.iter().all(|v| matches!(v, FilterValue::Int(_)))
            || values.iter().all(|v| matches!(v, FilterValue::Symbol(_)))
            || values.iter().all(|v| matches!(v, FilterValue::Name(_)));

        if !uniform {
            post_filters.insert(field_name.to_string(), values.clone());
            continue;
        }

        let clauses: Vec<String> = values
            .iter()
            .filter_map(|v| v.server_clause(field_name))
            .collect();

        if clauses.len() == 1 {
            expression_parts.extend(clauses);
        } else {
            expression_parts.push(format!("({})", clauses.join(" or ")));
        }
    }

    if expression_parts.is_empty() {
        Ok((None, post_filters))
    } else {
        Ok((Some(expression_parts.join(" and ")), post_filters))
    }
}

/// Evaluate residual filters against a wire row. A row passes only if every
/// filtered field is present with an allowed value; a missing field fails
/// the row.
pub fn post_filter(row: &serde_json::Map<String, Value>, filters: &QueryFilter) -> bool {
    for (field, allowed) in filters {
        match row.get(field) {
            Some(value) => {
                if !allowed.iter().any(|f| f.matches(value)) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldKind, FieldSpec};
    use fuzz_core::NodeState;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Probe {
        pool_name: String,
        machine_id: String,
        state: NodeState,
        version: String,
        priority: u32,
        comment: Option<String>,
    }

    impl Record for Probe {
        fn table_name() -> &'static str {
            "Probe"
        }

        fn key_fields() -> (&'static str, Option<&'static str>) {
            ("pool_name", Some("machine_id"))
        }

        fn schema() -> &'static [FieldSpec] {
            const SCHEMA: &[FieldSpec] = &[
                FieldSpec::new("pool_name", FieldKind::Primitive),
                FieldSpec::new("machine_id", FieldKind::Primitive),
                FieldSpec::new("state", FieldKind::Primitive),
                FieldSpec::new("version", FieldKind::Primitive),
                FieldSpec::new("priority", FieldKind::Int),
                FieldSpec::new("comment", FieldKind::Primitive),
            ];
            SCHEMA
        }

        fn keys(&self) -> (crate::keys::KeyValue, crate::keys::KeyValue) {
            (
                self.pool_name.as_str().into(),
                self.machine_id.as_str().into(),
            )
        }

        fn etag(&self) -> Option<&str> {
            None
        }

        fn set_etag(&mut self, _etag: String) {}
    }

    #[test]
    fn enumerated_values_compile_to_or_group() {
        let query = QueryFilter::from([(
            "state".to_string(),
            vec![
                FilterValue::state(NodeState::Init),
                FilterValue::state(NodeState::Busy),
            ],
        )]);
        let (expr, residual) = build_filters::<Probe>(&query).unwrap();
        assert_eq!(
            expr.as_deref(),
            Some("(state eq 'init' or state eq 'busy')")
        );
        assert!(residual.is_empty());
    }

    #[test]
    fn single_clause_is_not_parenthesized() {
        let query = QueryFilter::from([(
            "priority".to_string(),
            vec![FilterValue::Int(3)],
        )]);
        let (expr, _) = build_filters::<Probe>(&query).unwrap();
        assert_eq!(expr.as_deref(), Some("priority eq 3"));
    }

    #[test]
    fn key_fields_are_rewritten_to_store_columns() {
        let query = QueryFilter::from([
            (
                "pool_name".to_string(),
                vec![FilterValue::Name("linux".to_string())],
            ),
            ("priority".to_string(), vec![FilterValue::Int(1), FilterValue::Int(2)]),
        ]);
        let (expr, _) = build_filters::<Probe>(&query).unwrap();
        assert_eq!(
            expr.as_deref(),
            Some("PartitionKey eq 'linux' and (priority eq 1 or priority eq 2)")
        );
    }

    #[test]
    fn free_text_defers_to_residual() {
        let query = QueryFilter::from([(
            "comment".to_string(),
            vec![FilterValue::Text("contains space".to_string())],
        )]);
        let (expr, residual) = build_filters::<Probe>(&query).unwrap();
        assert!(expr.is_none());
        assert_eq!(
            residual.get("comment"),
            Some(&vec![FilterValue::Text("contains space".to_string())])
        );
    }

    #[test]
    fn mixed_shapes_defer_to_residual() {
        let query = QueryFilter::from([(
            "version".to_string(),
            vec![
                FilterValue::Name("1.2.3".to_string()),
                FilterValue::Int(4),
            ],
        )]);
        let (expr, residual) = build_filters::<Probe>(&query).unwrap();
        assert!(expr.is_none());
        assert_eq!(residual.len(), 1);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let query = QueryFilter::from([(
            "no_such_field".to_string(),
            vec![FilterValue::Int(1)],
        )]);
        assert!(matches!(
            build_filters::<Probe>(&query),
            Err(OrmError::UnknownField { .. })
        ));
    }

    #[test]
    fn empty_value_list_is_skipped() {
        let query = QueryFilter::from([("state".to_string(), Vec::new())]);
        let (expr, residual) = build_filters::<Probe>(&query).unwrap();
        assert!(expr.is_none());
        assert!(residual.is_empty());
    }

    #[test]
    fn post_filter_requires_presence_and_membership() {
        let filters = QueryFilter::from([(
            "comment".to_string(),
            vec![FilterValue::Text("wanted".to_string())],
        )]);

        let mut row = serde_json::Map::new();
        // Missing field fails the row.
        assert!(!post_filter(&row, &filters));

        row.insert("comment".to_string(), json!("other"));
        assert!(!post_filter(&row, &filters));

        row.insert("comment".to_string(), json!("wanted"));
        assert!(post_filter(&row, &filters));
    }

    #[test]
    fn post_filter_matches_integers_numerically() {
        let filters = QueryFilter::from([(
            "priority".to_string(),
            vec![FilterValue::Int(3)],
        )]);
        let mut row = serde_json::Map::new();
        row.insert("priority".to_string(), json!(3));
        assert!(post_filter(&row, &filters));
        row.insert("priority".to_string(), json!("3"));
        assert!(!post_filter(&row, &filters));
    }

    #[test]
    fn empty_filters_pass_everything() {
        let row = serde_json::Map::new();
        assert!(post_filter(&row, &QueryFilter::new()));
    }
}
