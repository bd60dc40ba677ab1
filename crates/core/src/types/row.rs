//! Result rows returned by the aggregation endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of an aggregation result: a flat JSON object.
///
/// Numeric accessors tolerate the service returning integers as floats and
/// vice versa.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(Map<String, Value>);

impl ResultRow {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Integer value, truncating floats.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        let value = self.get(field)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    }

    #[must_use]
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// String rendering of a scalar field, for ids that may be numeric.
    #[must_use]
    pub fn get_display(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ResultRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for ResultRow {
    type Error = Value;

    /// Accept JSON objects; hand anything else back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_accessors() {
        let row = ResultRow::try_from(json!({"count": 3, "ratio": 0.5, "total": 7.0})).unwrap();
        assert_eq!(row.get_i64("count"), Some(3));
        assert_eq!(row.get_f64("count"), Some(3.0));
        assert_eq!(row.get_f64("ratio"), Some(0.5));
        assert_eq!(row.get_i64("total"), Some(7));
        assert_eq!(row.get_i64("missing"), None);
    }

    #[test]
    fn test_get_display() {
        let row = ResultRow::try_from(json!({"id": 42, "name": "home", "n": null})).unwrap();
        assert_eq!(row.get_display("id").as_deref(), Some("42"));
        assert_eq!(row.get_display("name").as_deref(), Some("home"));
        assert_eq!(row.get_display("n"), None);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(ResultRow::try_from(json!([1, 2])).is_err());
    }
}
