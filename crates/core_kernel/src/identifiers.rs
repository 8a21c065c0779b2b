//! Strongly-typed identifiers
//!
//! CRM records and local forms both use numeric keys; wrapping them keeps a
//! form id from ever being sent where a CRM id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_numeric_id {
    ($name:ident, $what:literal) => {
        #[doc = concat!("Identifier of ", $what)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value
            pub const fn value(&self) -> i64 {
                self.0
            }

            /// Reads an identifier from a JSON number or numeric string
            pub fn from_json(value: &serde_json::Value) -> Option<Self> {
                match value {
                    serde_json::Value::Number(n) => n.as_i64().map(Self),
                    serde_json::Value::String(s) => s.trim().parse().ok().map(Self),
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_numeric_id!(CrmId, "a record assigned by the CRM");
define_numeric_id!(FormId, "a lead-intake form in the local form store");

/// Identifier of a single sync run, used to correlate log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    /// Creates a new time-ordered identifier (v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYNC-{}", self.0)
    }
}

/// The CRM entity types this engine writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Company,
    Person,
}

impl EntityKind {
    /// Name used by the CRM in custom-field configuration paths
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::Person => "Person",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
