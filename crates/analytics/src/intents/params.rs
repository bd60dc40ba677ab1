//! Declarative parameter schemas.
//!
//! A [`ParamSpec`] list is the single source of truth for a tool's inputs:
//! it renders the JSON Schema shown to callers and validates raw input
//! before any pipeline is built.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::IntentError;

/// Type and bounds of one parameter.
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    /// Integer in `[min, max]`.
    Integer {
        min: i64,
        max: i64,
        default: Option<i64>,
    },
    /// Free-form non-empty string.
    Text,
    /// One of a fixed set of strings.
    Choice {
        values: &'static [&'static str],
        default: Option<&'static str>,
    },
    /// Non-empty list of non-empty strings.
    TextList { min_items: usize },
    /// List of objects, validated by the intent that consumes it.
    ObjectList {
        min_items: usize,
        item_schema: fn() -> Value,
    },
}

/// One named parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Optional integer with a default.
    #[must_use]
    pub const fn integer(
        name: &'static str,
        description: &'static str,
        min: i64,
        max: i64,
        default: i64,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Integer {
                min,
                max,
                default: Some(default),
            },
        }
    }

    /// Optional integer without a default.
    #[must_use]
    pub const fn optional_integer(
        name: &'static str,
        description: &'static str,
        min: i64,
        max: i64,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Integer {
                min,
                max,
                default: None,
            },
        }
    }

    #[must_use]
    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::Text,
        }
    }

    #[must_use]
    pub const fn optional_text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Text,
        }
    }

    /// Optional choice with a default.
    #[must_use]
    pub const fn choice(
        name: &'static str,
        description: &'static str,
        values: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Choice {
                values,
                default: Some(default),
            },
        }
    }

    /// Required choice.
    #[must_use]
    pub const fn required_choice(
        name: &'static str,
        description: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::Choice {
                values,
                default: None,
            },
        }
    }

    #[must_use]
    pub const fn text_list(name: &'static str, description: &'static str, min_items: usize) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::TextList { min_items },
        }
    }

    #[must_use]
    pub const fn object_list(
        name: &'static str,
        description: &'static str,
        min_items: usize,
        item_schema: fn() -> Value,
    ) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::ObjectList {
                min_items,
                item_schema,
            },
        }
    }

    /// JSON Schema fragment for this parameter.
    #[must_use]
    pub fn schema(&self) -> Value {
        let mut schema = match self.kind {
            ParamKind::Integer { min, max, default } => {
                let mut s = json!({"type": "integer", "minimum": min, "maximum": max});
                if let Some(default) = default {
                    s["default"] = json!(default);
                }
                s
            }
            ParamKind::Text => json!({"type": "string", "minLength": 1}),
            ParamKind::Choice { values, default } => {
                let mut s = json!({"type": "string", "enum": values});
                if let Some(default) = default {
                    s["default"] = json!(default);
                }
                s
            }
            ParamKind::TextList { min_items } => json!({
                "type": "array",
                "items": {"type": "string", "minLength": 1},
                "minItems": min_items,
            }),
            ParamKind::ObjectList {
                min_items,
                item_schema,
            } => json!({
                "type": "array",
                "items": item_schema(),
                "minItems": min_items,
            }),
        };
        schema["description"] = json!(self.description);
        schema
    }
}

/// JSON Schema for an object whose properties are `specs`.
#[must_use]
pub fn object_schema(specs: &[ParamSpec]) -> Value {
    let properties = specs
        .iter()
        .map(|spec| (spec.name.to_string(), spec.schema()))
        .collect::<Map<_, _>>();
    let required: Vec<&str> = specs.iter().filter(|s| s.required).map(|s| s.name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A validated parameter value.
#[derive(Debug, Clone, PartialEq)]
enum ParamValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
    Objects(Vec<Map<String, Value>>),
}

/// Input that passed validation against a spec list, with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<&'static str, ParamValue>,
}

impl Params {
    /// Validate `input` against `specs`.
    ///
    /// `null` and absent values are treated alike. Keys not named by any spec
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::InvalidParameters` on a missing required value,
    /// a wrong type, an out-of-range number or an unknown choice.
    pub fn validate(specs: &[ParamSpec], input: &Value) -> Result<Self, IntentError> {
        let empty = Map::new();
        let object = match input {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => return Err(invalid("input must be a JSON object")),
        };

        let mut values = HashMap::new();
        for spec in specs {
            let raw = object.get(spec.name).filter(|v| !v.is_null());
            if let Some(value) = validate_one(spec, raw)? {
                values.insert(spec.name, value);
            }
        }
        Ok(Self { values })
    }

    /// Integer value (or its default).
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the parameter is absent.
    pub fn int(&self, name: &str) -> Result<i64, IntentError> {
        match self.values.get(name) {
            Some(ParamValue::Int(i)) => Ok(*i),
            _ => Err(invalid(format!("{name} is required"))),
        }
    }

    #[must_use]
    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Integer value as a positive count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the parameter is absent or negative.
    pub fn count(&self, name: &str) -> Result<u32, IntentError> {
        let value = self.int(name)?;
        u32::try_from(value).map_err(|_| invalid(format!("{name} must be non-negative")))
    }

    /// String value (or its default).
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the parameter is absent.
    pub fn text(&self, name: &str) -> Result<&str, IntentError> {
        self.opt_text(name)
            .ok_or_else(|| invalid(format!("{name} is required")))
    }

    #[must_use]
    pub fn opt_text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// String list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the parameter is absent.
    pub fn list(&self, name: &str) -> Result<&[String], IntentError> {
        match self.values.get(name) {
            Some(ParamValue::List(items)) => Ok(items),
            _ => Err(invalid(format!("{name} is required"))),
        }
    }

    /// Object list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the parameter is absent.
    pub fn objects(&self, name: &str) -> Result<&[Map<String, Value>], IntentError> {
        match self.values.get(name) {
            Some(ParamValue::Objects(items)) => Ok(items),
            _ => Err(invalid(format!("{name} is required"))),
        }
    }
}

fn validate_one(spec: &ParamSpec, raw: Option<&Value>) -> Result<Option<ParamValue>, IntentError> {
    let name = spec.name;
    let Some(raw) = raw else {
        if spec.required {
            return Err(invalid(format!("{name} is required")));
        }
        return Ok(match spec.kind {
            ParamKind::Integer {
                default: Some(d), ..
            } => Some(ParamValue::Int(d)),
            ParamKind::Choice {
                default: Some(d), ..
            } => Some(ParamValue::Text(d.to_string())),
            _ => None,
        });
    };

    let value = match spec.kind {
        ParamKind::Integer { min, max, .. } => {
            let n = as_integer(raw).ok_or_else(|| invalid(format!("{name} must be an integer")))?;
            if n < min || n > max {
                return Err(invalid(format!(
                    "{name} must be between {min} and {max} (got {n})"
                )));
            }
            ParamValue::Int(n)
        }
        ParamKind::Text => ParamValue::Text(non_empty_text(name, raw)?),
        ParamKind::Choice { values, .. } => {
            let s = raw
                .as_str()
                .ok_or_else(|| invalid(format!("{name} must be a string")))?;
            let s = s.trim().to_ascii_lowercase();
            if !values.contains(&s.as_str()) {
                return Err(invalid(format!(
                    "{name} must be one of {} (got '{s}')",
                    values.join(", ")
                )));
            }
            ParamValue::Text(s)
        }
        ParamKind::TextList { min_items } => {
            let items = raw
                .as_array()
                .ok_or_else(|| invalid(format!("{name} must be an array of strings")))?;
            let items = items
                .iter()
                .map(|item| non_empty_text(name, item))
                .collect::<Result<Vec<_>, _>>()?;
            if items.len() < min_items {
                return Err(invalid(format!("{name} needs at least {min_items} item(s)")));
            }
            ParamValue::List(items)
        }
        ParamKind::ObjectList { min_items, .. } => {
            let items = raw
                .as_array()
                .ok_or_else(|| invalid(format!("{name} must be an array of objects")))?;
            let items = items
                .iter()
                .map(|item| {
                    item.as_object()
                        .cloned()
                        .ok_or_else(|| invalid(format!("each {name} entry must be an object")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if items.len() < min_items {
                return Err(invalid(format!("{name} needs at least {min_items} item(s)")));
            }
            ParamValue::Objects(items)
        }
    };
    Ok(Some(value))
}

/// Integers may arrive as JSON numbers, integral floats or numeric strings.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_text(name: &str, value: &Value) -> Result<String, IntentError> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(invalid(format!("{name} must be a string"))),
    };
    if s.is_empty() {
        return Err(invalid(format!("{name} cannot be empty")));
    }
    Ok(s)
}

fn invalid(reason: impl Into<String>) -> IntentError {
    IntentError::InvalidParameters(reason.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::integer("days_back", "Days to look back", 1, 90, 7),
        ParamSpec::choice("group_by", "Granularity", &["day", "hour"], "day"),
        ParamSpec::optional_text("account_id", "Account filter"),
    ];

    #[test]
    fn test_defaults_applied() {
        let params = Params::validate(SPECS, &json!({})).unwrap();
        assert_eq!(params.int("days_back").unwrap(), 7);
        assert_eq!(params.text("group_by").unwrap(), "day");
        assert!(params.opt_text("account_id").is_none());
    }

    #[test]
    fn test_null_input_uses_defaults() {
        let params = Params::validate(SPECS, &Value::Null).unwrap();
        assert_eq!(params.count("days_back").unwrap(), 7);
    }

    #[test]
    fn test_out_of_range_rejected() {
        for days in [0, 91, -5] {
            let err = Params::validate(SPECS, &json!({"days_back": days})).unwrap_err();
            assert!(matches!(err, IntentError::InvalidParameters(_)));
        }
    }

    #[test]
    fn test_unknown_choice_rejected() {
        let err = Params::validate(SPECS, &json!({"group_by": "month"})).unwrap_err();
        assert!(err.to_string().contains("day, hour"));
    }

    #[test]
    fn test_lenient_integer_forms() {
        let params = Params::validate(SPECS, &json!({"days_back": "14"})).unwrap();
        assert_eq!(params.int("days_back").unwrap(), 14);
        let params = Params::validate(SPECS, &json!({"days_back": 30.0})).unwrap();
        assert_eq!(params.int("days_back").unwrap(), 30);
        assert!(Params::validate(SPECS, &json!({"days_back": 2.5})).is_err());
    }

    #[test]
    fn test_required_text_and_lists() {
        let specs = [
            ParamSpec::text("guide_id", "Guide"),
            ParamSpec::text_list("feature_ids", "Features", 1),
        ];
        assert!(Params::validate(&specs, &json!({"feature_ids": ["f1"]})).is_err());
        assert!(Params::validate(&specs, &json!({"guide_id": "g", "feature_ids": []})).is_err());
        assert!(Params::validate(&specs, &json!({"guide_id": " ", "feature_ids": ["f"]})).is_err());

        let params =
            Params::validate(&specs, &json!({"guide_id": "g", "feature_ids": ["f1", "f2"]}))
                .unwrap();
        assert_eq!(params.list("feature_ids").unwrap(), ["f1", "f2"]);
    }

    #[test]
    fn test_schema_rendering() {
        let schema = object_schema(SPECS);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["days_back"]["minimum"], 1);
        assert_eq!(schema["properties"]["days_back"]["maximum"], 90);
        assert_eq!(schema["properties"]["group_by"]["enum"], json!(["day", "hour"]));
        assert_eq!(schema["required"], json!([]));
    }
}
