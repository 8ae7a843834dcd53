//! Audit log of clarification Q/A pairs

use serde::{Deserialize, Serialize};

/// One question/answer pair recorded during a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The record key the question was about
    pub question: String,
    /// The submitted answer, empty if none was given
    pub answer: String,
}

impl AuditEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.answer.is_empty()
    }
}

impl std::fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q: {}\nA: {}", self.question, self.answer)
    }
}

/// Ordered audit log, one entry per previously unresolved key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    /// Append every entry of another log, keeping order
    pub fn extend(&mut self, other: AuditLog) {
        self.0.extend(other.0);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Formatted "Q: ...\nA: ..." lines
    pub fn lines(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}
