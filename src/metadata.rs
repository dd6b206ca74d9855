//! Document metadata as a closed value union.
//!
//! Header blocks are free-form YAML, but everything downstream only needs a
//! handful of shapes. [`Metadata`] maps each key to a [`MetaValue`] that is
//! one of string, number, boolean, list of strings, or null. Anything richer
//! (nested maps, lists of lists) is flattened to its compact JSON text so it
//! survives the round trip into the `frontmatter` column.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Convert a YAML value into the closed union.
    pub fn from_yaml(value: &YamlValue) -> Self {
        match value {
            YamlValue::Null => MetaValue::Null,
            YamlValue::Bool(b) => MetaValue::Bool(*b),
            YamlValue::Number(n) => n.as_f64().map(MetaValue::Number).unwrap_or(MetaValue::Null),
            YamlValue::String(s) => MetaValue::String(s.clone()),
            YamlValue::Sequence(items) => {
                MetaValue::List(items.iter().filter_map(yaml_item_text).collect())
            }
            YamlValue::Mapping(_) => MetaValue::String(compact_json(value)),
            YamlValue::Tagged(tagged) => MetaValue::from_yaml(&tagged.value),
        }
    }

    /// Convert a JSON value (as stored in the `frontmatter` column).
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => MetaValue::Null,
            JsonValue::Bool(b) => MetaValue::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(MetaValue::Number).unwrap_or(MetaValue::Null),
            JsonValue::String(s) => MetaValue::String(s.clone()),
            JsonValue::Array(items) => {
                MetaValue::List(items.iter().filter_map(json_item_text).collect())
            }
            JsonValue::Object(_) => MetaValue::String(value.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            MetaValue::Null => JsonValue::Null,
            MetaValue::Bool(b) => JsonValue::Bool(*b),
            MetaValue::Number(n) => number_to_json(*n),
            MetaValue::String(s) => JsonValue::String(s.clone()),
            MetaValue::List(items) => {
                JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
            }
        }
    }

    /// Trimmed string content, if this is a non-blank string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Key/value metadata parsed from a document header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<String, MetaValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a YAML mapping. Non-string keys are rendered to text.
    pub fn from_yaml_mapping(mapping: &serde_yaml::Mapping) -> Self {
        let entries = mapping
            .iter()
            .filter_map(|(k, v)| yaml_item_text(k).map(|key| (key, MetaValue::from_yaml(v))))
            .collect();
        Self { entries }
    }

    /// Build from a stored JSON object. Anything else yields empty metadata.
    pub fn from_json(value: &JsonValue) -> Self {
        let entries = match value {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), MetaValue::from_json(v)))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self { entries }
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    /// Non-blank trimmed string under `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_text)
    }

    /// Strict boolean under `key`; the string `"true"` is not a flag.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(MetaValue::as_bool)
    }

    /// First non-blank string among `keys`, in order.
    pub fn first_text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.text(k))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn yaml_item_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Null => None,
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Tagged(tagged) => yaml_item_text(&tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => Some(compact_json(value)),
    }
}

fn json_item_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compact_json(value: &YamlValue) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}
