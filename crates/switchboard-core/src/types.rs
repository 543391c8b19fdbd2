use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of one user request. Every display message, chat history
/// entry, and scoped context created while serving the request carries it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a fresh random request id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Wall-clock instant with millisecond precision.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// A named property of an entity, e.g. `{ name: "genre", value: "jazz" }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    pub value: serde_json::Value,
}

/// A structured fact extracted from an action result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Display name of the entity ("Kind of Blue").
    pub name: String,
    /// Kinds the entity belongs to ("album", "music").
    #[serde(rename = "type")]
    pub entity_type: Vec<String>,
    /// Stable identifier assigned by the agent that produced the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: &[&str]) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.iter().map(|t| t.to_string()).collect(),
            unique_id: None,
            facets: Vec::new(),
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_facet(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.facets.push(Facet {
            name: name.into(),
            value,
        });
        self
    }

    /// Whether any of the entity's kinds is in `kinds`.
    pub fn has_any_kind(&self, kinds: &[String]) -> bool {
        self.entity_type.iter().any(|t| kinds.contains(t))
    }
}
