//! Validated name newtypes and small fleet-wide enums.
//!
//! Pool, region, and container names are restricted to a conservative
//! character set at construction time. Downstream, the query compiler
//! relies on that restriction: a validated name can be embedded in a
//! server-side filter expression without escaping.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected name value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} name: {value:?}")]
pub struct InvalidName {
    pub kind: &'static str,
    pub value: String,
}

fn validate(kind: &'static str, value: String) -> Result<String, InvalidName> {
    let ok = !value.is_empty()
        && value.len() <= 64
        && value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(value)
    } else {
        Err(InvalidName { kind, value })
    }
}

macro_rules! safe_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, InvalidName> {
                validate($kind, value.into()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidName;

            fn try_from(value: String) -> Result<Self, InvalidName> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

safe_name!(
    /// Name of a fuzzing pool.
    PoolName,
    "pool"
);

safe_name!(
    /// Cloud region a scaleset is placed in.
    Region,
    "region"
);

safe_name!(
    /// Storage container holding task inputs or crash artifacts.
    Container,
    "container"
);

/// Operating system a pool's nodes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    Windows,
    Linux,
}

/// CPU architecture of a pool's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    X86_64,
    Aarch64,
}
