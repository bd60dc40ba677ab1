//! Pendo entity types returned by the simple-entity endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A tagged page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Page {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "de_opt_id")]
    pub app_id: Option<String>,
    /// Epoch milliseconds.
    pub created_at: Option<i64>,
    pub last_updated_at: Option<i64>,
}

/// A tagged feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feature {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "de_opt_id")]
    pub app_id: Option<String>,
    #[serde(deserialize_with = "de_opt_id")]
    pub page_id: Option<String>,
    pub created_at: Option<i64>,
    pub last_updated_at: Option<i64>,
}

/// A track event type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackType {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "de_opt_id")]
    pub app_id: Option<String>,
    pub created_at: Option<i64>,
}

/// A saved visitor segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub created_at: Option<i64>,
    pub shared: bool,
}

/// Metadata groups attached to visitors and accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Fields Pendo maintains (`firstvisit`, `lastvisit`, `accountid`, ...).
    pub auto: Map<String, Value>,
    /// Fields sent by the installed agent.
    pub agent: Map<String, Value>,
    /// Fields defined in the Pendo UI.
    pub custom: Map<String, Value>,
}

impl Metadata {
    /// Look up an `auto` field, matching the key case-insensitively.
    #[must_use]
    pub fn auto_field(&self, key: &str) -> Option<&Value> {
        self.auto
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn auto_millis(&self, key: &str) -> Option<i64> {
        self.auto_field(key).and_then(Value::as_i64).filter(|ms| *ms > 0)
    }

    #[must_use]
    pub fn auto_str(&self, key: &str) -> Option<&str> {
        self.auto_field(key).and_then(Value::as_str)
    }
}

/// A visitor record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Visitor {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub metadata: Metadata,
}

/// An account record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub metadata: Metadata,
}

/// Pendo ids and app ids come back as strings or numbers depending on the
/// entity; both are normalised to strings.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(de_opt_id(deserializer)?.unwrap_or_default())
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
