//! Key resolution — typed key values to table key strings.
//!
//! The partition and row key of every stored row are strings. `KeyValue`
//! is the closed set of types that may act as keys, and [`KeyValue::resolve`]
//! is the single place the key-to-string policy lives: the write path
//! (deriving `PartitionKey`/`RowKey` from serialized fields) and the read
//! path (point lookups) both go through it.

use serde_json::Value;
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use fuzz_core::{Container, FleetState, PoolName, Region};

/// A typed value usable as a partition or row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Str(String),
    Int(i64),
    Uuid(Uuid),
    /// Symbolic name of an enumerated value (never its ordinal).
    Symbol(&'static str),
}

impl KeyValue {
    /// Resolve to the table store's string key representation.
    pub fn resolve(&self) -> String {
        match self {
            KeyValue::Str(s) => s.clone(),
            KeyValue::Int(i) => i.to_string(),
            KeyValue::Uuid(u) => u.to_string(),
            KeyValue::Symbol(s) => (*s).to_string(),
        }
    }

    /// Rebuild a key from a serialized column value.
    ///
    /// Only strings and integers survive serialization as key-capable
    /// values (UUIDs and enum symbols are strings by then); anything else
    /// in a key column is a schema bug.
    pub fn from_wire(value: &Value) -> OrmResult<KeyValue> {
        match value {
            Value::String(s) => Ok(KeyValue::Str(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(KeyValue::Int(i)),
                None => Err(OrmError::UnsupportedKey(n.to_string())),
            },
            other => Err(OrmError::UnsupportedKey(other.to_string())),
        }
    }

    /// Key for an enumerated lifecycle state.
    pub fn state<S: FleetState>(state: S) -> KeyValue {
        KeyValue::Symbol(state.name())
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Str(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Str(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        KeyValue::Uuid(value)
    }
}

impl From<&PoolName> for KeyValue {
    fn from(value: &PoolName) -> Self {
        KeyValue::Str(value.as_str().to_string())
    }
}

impl From<&Region> for KeyValue {
    fn from(value: &Region) -> Self {
        KeyValue::Str(value.as_str().to_string())
    }
}

impl From<&Container> for KeyValue {
    fn from(value: &Container) -> Self {
        KeyValue::Str(value.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzz_core::NodeState;
    use serde_json::json;

    #[test]
    fn resolve_string_is_identity() {
        assert_eq!(KeyValue::from("linux-pool").resolve(), "linux-pool");
    }

    #[test]
    fn resolve_uuid_is_canonical_form() {
        let id = Uuid::parse_str("6a43bfd9-1ab6-4b94-90b9-99bf0e40b7ed").unwrap();
        assert_eq!(
            KeyValue::from(id).resolve(),
            "6a43bfd9-1ab6-4b94-90b9-99bf0e40b7ed"
        );
    }

    #[test]
    fn resolve_symbol_uses_name_not_ordinal() {
        assert_eq!(KeyValue::state(NodeState::SettingUp).resolve(), "setting_up");
    }

    #[test]
    fn resolve_int_is_decimal() {
        assert_eq!(KeyValue::from(42i64).resolve(), "42");
        assert_eq!(KeyValue::from(-7i64).resolve(), "-7");
    }

    #[test]
    fn from_wire_accepts_strings_and_integers() {
        assert_eq!(
            KeyValue::from_wire(&json!("abc")).unwrap().resolve(),
            "abc"
        );
        assert_eq!(KeyValue::from_wire(&json!(17)).unwrap().resolve(), "17");
    }

    #[test]
    fn from_wire_rejects_other_shapes() {
        for value in [json!(true), json!(1.5), json!(null), json!([1]), json!({})] {
            assert!(matches!(
                KeyValue::from_wire(&value),
                Err(OrmError::UnsupportedKey(_))
            ));
        }
    }
}
