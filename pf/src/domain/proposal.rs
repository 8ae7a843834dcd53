//! Proposal produced by the final stage

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Final proposal content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "content", rename_all = "lowercase")]
pub enum Proposal {
    /// Free-form document exactly as the model wrote it
    Text(String),
    /// Parsed JSON document (structured-output mode)
    Structured(Map<String, Value>),
}

impl Proposal {
    pub fn is_structured(&self) -> bool {
        matches!(self, Proposal::Structured(_))
    }

    /// Title, when the structured document carries one
    pub fn title(&self) -> Option<&str> {
        match self {
            Proposal::Structured(doc) => doc.get("title").and_then(Value::as_str),
            Proposal::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Proposal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proposal::Text(text) => f.write_str(text),
            Proposal::Structured(doc) => {
                let pretty = serde_json::to_string_pretty(doc).map_err(|_| std::fmt::Error)?;
                f.write_str(&pretty)
            }
        }
    }
}
