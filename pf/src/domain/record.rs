//! InformationRecord - the canonical question-label → answer mapping
//!
//! Unresolved fields are an explicit variant rather than a magic string. The
//! `"Not provided"` literal only exists at the serialization boundary, where
//! prompts and front ends still expect it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Wire form of an unresolved field
pub const NOT_PROVIDED: &str = "Not provided";

/// Check whether text is the "not provided" sentinel
///
/// Matching ignores case, surrounding whitespace, inner whitespace runs and a
/// trailing period, since model output varies on all of those.
pub fn is_not_provided_marker(text: &str) -> bool {
    normalize(text) == "not provided"
}

pub(crate) fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches('.')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A JSON value too deeply structured to be a field answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected {0} value for a record field")]
pub struct UnsupportedShape(pub &'static str);

/// Value of one record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "String")]
pub enum FieldValue {
    /// A substantive, non-empty answer
    Provided(String),
    /// The field is still unresolved
    NotProvided,
}

impl FieldValue {
    /// Interpret raw text; blank text and the sentinel are unresolved
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_not_provided_marker(trimmed) {
            FieldValue::NotProvided
        } else {
            FieldValue::Provided(trimmed.to_string())
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FieldValue::Provided(_))
    }

    /// The answer, if there is one
    pub fn answer(&self) -> Option<&str> {
        match self {
            FieldValue::Provided(text) => Some(text),
            FieldValue::NotProvided => None,
        }
    }

    /// Wire text, with the sentinel standing in for unresolved fields
    pub fn as_str(&self) -> &str {
        self.answer().unwrap_or(NOT_PROVIDED)
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = UnsupportedShape;

    /// Coerce a JSON value into a field
    ///
    /// Strings are parsed, lists of scalars are joined with ", ", numbers and
    /// booleans are stringified, null is unresolved. Objects and nested lists
    /// are rejected.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(FieldValue::NotProvided),
            Value::String(text) => Ok(FieldValue::parse(&text)),
            Value::Number(n) => Ok(FieldValue::parse(&n.to_string())),
            Value::Bool(b) => Ok(FieldValue::parse(&b.to_string())),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
                        Value::String(_) | Value::Null => {}
                        Value::Number(n) => parts.push(n.to_string()),
                        Value::Bool(b) => parts.push(b.to_string()),
                        Value::Array(_) | Value::Object(_) => return Err(UnsupportedShape("nested list")),
                    }
                }
                Ok(FieldValue::parse(&parts.join(", ")))
            }
            Value::Object(_) => Err(UnsupportedShape("object")),
        }
    }
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered mapping of question labels to answers
///
/// Key order is the order fields were declared (schema order for fresh
/// extractions, document order for records submitted by a front end) and is
/// preserved through every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InformationRecord {
    fields: IndexMap<String, FieldValue>,
}

impl InformationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping its original position if present
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Find the stored key matching `key` exactly, else case-insensitively
    pub fn find_key(&self, key: &str) -> Option<&str> {
        if let Some((stored, _)) = self.fields.get_key_value(key) {
            return Some(stored.as_str());
        }
        let wanted = normalize(key);
        self.fields.keys().find(|k| normalize(k) == wanted).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys still holding the unresolved variant, in record order
    pub fn unresolved_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_resolved())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// True when no field is unresolved
    pub fn is_complete(&self) -> bool {
        self.fields.values().all(FieldValue::is_resolved)
    }

    /// Pretty JSON for embedding into prompts
    pub fn to_prompt_json(&self) -> String {
        debug!(field_count = self.fields.len(), "InformationRecord::to_prompt_json: called");
        let object: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.as_str().to_string())))
            .collect();
        serde_json::to_string_pretty(&object).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, FieldValue)> for InformationRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InformationRecord {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = indexmap::map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
