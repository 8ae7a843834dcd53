//! ClarificationSet - either "complete" or questions for unresolved fields

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::record::normalize;

/// Wire form of the completeness marker value
pub const NO_QUESTIONS_NEEDED: &str = "No additional questions needed.";

/// Key under which the completeness marker travels
pub const RESULT_KEY: &str = "result";

/// Check whether text says no further questions are required
pub fn is_completeness_marker(text: &str) -> bool {
    let normalized = normalize(text);
    normalized.starts_with("no additional questions") || normalized.starts_with("no further questions")
}

/// Outcome of the question stage
///
/// Never empty and never mixed: a set with no questions is `Complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationSet {
    /// No further clarification required
    Complete,
    /// Unresolved key → question text, in record order
    Questions(IndexMap<String, String>),
}

impl ClarificationSet {
    /// Build from a question map, collapsing an empty map to `Complete`
    pub fn from_questions(questions: IndexMap<String, String>) -> Self {
        if questions.is_empty() {
            ClarificationSet::Complete
        } else {
            ClarificationSet::Questions(questions)
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ClarificationSet::Complete)
    }

    pub fn questions(&self) -> Option<&IndexMap<String, String>> {
        match self {
            ClarificationSet::Complete => None,
            ClarificationSet::Questions(q) => Some(q),
        }
    }

    /// Number of open questions
    pub fn len(&self) -> usize {
        self.questions().map(IndexMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for ClarificationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClarificationSet::Complete => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(RESULT_KEY, NO_QUESTIONS_NEEDED)?;
                map.end()
            }
            ClarificationSet::Questions(questions) => questions.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ClarificationSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, String>::deserialize(deserializer)?;
        let is_marker = map.len() == 1
            && map
                .get(RESULT_KEY)
                .map(|v| is_completeness_marker(v))
                .unwrap_or(false);
        if is_marker {
            Ok(ClarificationSet::Complete)
        } else {
            Ok(ClarificationSet::from_questions(map))
        }
    }
}
