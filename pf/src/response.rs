//! Response extraction - pull a JSON object out of raw completion text
//!
//! Model output is untrusted prose that is expected to contain one JSON
//! object. The heuristic is deliberately simple: slice from the first `{` to
//! the last `}` and parse strictly. Text with stray braces outside the real
//! object defeats it; callers treat extraction as best-effort.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::domain::{FieldValue, InformationRecord, UnsupportedShape};

/// Longest fragment kept in a `MalformedJson` error
const FRAGMENT_LIMIT: usize = 2000;

/// Errors from extracting JSON out of completion text
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No JSON object found in completion text")]
    NoJsonFound,

    #[error("Malformed JSON in completion text: {source}")]
    MalformedJson {
        /// The sliced candidate text, truncated for diagnostics
        fragment: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected {found} value for field '{key}'")]
    UnexpectedShape { key: String, found: &'static str },
}

/// Locate and parse the JSON object embedded in `raw`
pub fn extract_json(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    debug!(raw_len = raw.len(), "extract_json: called");
    let (start, end) = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            debug!("extract_json: no brace pair found");
            return Err(ExtractionError::NoJsonFound);
        }
    };

    // A closer before the opener leaves nothing to parse
    let candidate = if start < end { &raw[start..=end] } else { "" };
    serde_json::from_str::<Map<String, Value>>(candidate).map_err(|source| {
        debug!(error = %source, "extract_json: candidate failed to parse");
        ExtractionError::MalformedJson {
            fragment: truncate(candidate, FRAGMENT_LIMIT),
            source,
        }
    })
}

/// Validate a parsed object into an InformationRecord
///
/// Strings are taken as-is (blank or sentinel → unresolved), lists of scalars
/// are joined with ", ", numbers and booleans are stringified, null is
/// unresolved. Nested objects and lists containing objects are rejected.
pub fn record_from_object(object: Map<String, Value>) -> Result<InformationRecord, ExtractionError> {
    debug!(key_count = object.len(), "record_from_object: called");
    object
        .into_iter()
        .map(|(key, value)| {
            let field = field_from_value(&key, value)?;
            Ok((key, field))
        })
        .collect()
}

/// Extract and validate a record from raw completion text
pub fn parse_record(raw: &str) -> Result<InformationRecord, ExtractionError> {
    record_from_object(extract_json(raw)?)
}

fn field_from_value(key: &str, value: Value) -> Result<FieldValue, ExtractionError> {
    FieldValue::try_from(value).map_err(|UnsupportedShape(found)| ExtractionError::UnexpectedShape {
        key: key.to_string(),
        found,
    })
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}
