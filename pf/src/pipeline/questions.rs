//! QuestionStage - clarification questions for unresolved fields
//!
//! The model is asked first. Its answer is only trusted when it is well formed
//! and agrees with the record; anything else falls back to a deterministic scan
//! of the record, so this stage never fails.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Services;
use crate::domain::{ClarificationSet, InformationRecord, RESULT_KEY, is_completeness_marker};
use crate::prompts::{self, QuestionContext};
use crate::response::extract_json;

/// Question text used when the model gives none for `key`
pub fn fallback_question(key: &str) -> String {
    format!("Please provide information for: {}", key)
}

/// Produces either the completeness signal or questions for unresolved keys
#[derive(Debug, Clone)]
pub struct QuestionStage {
    services: Services,
    max_tokens: u32,
}

impl QuestionStage {
    pub fn new(services: Services, max_tokens: u32) -> Self {
        Self { services, max_tokens }
    }

    /// Ask about every unresolved field of `record`
    pub async fn ask(&self, record: &InformationRecord) -> ClarificationSet {
        debug!(unresolved = record.unresolved_keys().len(), "QuestionStage::ask: called");

        let prompt = match self.services.prompts.render(prompts::QUESTIONS, &QuestionContext::new(record)) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Question prompt failed to render, using fallback questions");
                return Self::fallback(record);
            }
        };

        let raw = match self.services.complete(prompt, self.max_tokens).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Question completion failed, using fallback questions");
                return Self::fallback(record);
            }
        };

        match Self::interpret(record, &raw) {
            Some(set) => {
                info!(question_count = set.len(), "Model questions accepted");
                set
            }
            None => {
                warn!("Model questions unusable, using fallback questions");
                Self::fallback(record)
            }
        }
    }

    /// Deterministic path: one generic question per unresolved key
    pub fn fallback(record: &InformationRecord) -> ClarificationSet {
        debug!("QuestionStage::fallback: called");
        ClarificationSet::from_questions(
            record
                .unresolved_keys()
                .into_iter()
                .map(|key| (key.to_string(), fallback_question(key)))
                .collect(),
        )
    }

    /// Model-driven path: validate raw output against the record
    ///
    /// Returns `None` when the output should be discarded in favour of the
    /// fallback: no parseable JSON, no usable question text, no question
    /// addressing an unresolved key, or a completeness claim while fields are
    /// still unresolved. Unresolved keys the model skipped get the fallback
    /// question; questions about resolved or unknown keys are dropped.
    pub fn interpret(record: &InformationRecord, raw: &str) -> Option<ClarificationSet> {
        debug!(raw_len = raw.len(), "QuestionStage::interpret: called");
        let object = match extract_json(raw) {
            Ok(object) => object,
            Err(e) => {
                debug!(error = %e, "QuestionStage::interpret: no usable JSON");
                return None;
            }
        };

        if claims_complete(&object) {
            if record.is_complete() {
                return Some(ClarificationSet::Complete);
            }
            debug!("QuestionStage::interpret: completeness claim conflicts with record");
            return None;
        }

        let asked: Vec<(&str, String)> = object
            .iter()
            .filter_map(|(key, value)| question_text(value).map(|text| (key.as_str(), text)))
            .collect();
        if asked.is_empty() {
            debug!("QuestionStage::interpret: every value was empty");
            return None;
        }

        let mut matched: IndexMap<&str, String> = IndexMap::new();
        for (key, text) in asked {
            match record.find_key(key) {
                Some(stored) if record.get(stored).is_some_and(|v| !v.is_resolved()) => {
                    matched.insert(stored, text);
                }
                _ => debug!(%key, "QuestionStage::interpret: dropping question for resolved or unknown key"),
            }
        }
        if matched.is_empty() {
            return None;
        }

        let questions: IndexMap<String, String> = record
            .unresolved_keys()
            .into_iter()
            .map(|key| {
                let text = matched.shift_remove(key).unwrap_or_else(|| fallback_question(key));
                (key.to_string(), text)
            })
            .collect();
        Some(ClarificationSet::from_questions(questions))
    }
}

fn claims_complete(object: &serde_json::Map<String, Value>) -> bool {
    let marker = object
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(RESULT_KEY))
        .and_then(|(_, v)| v.as_str());
    match marker {
        Some(text) => is_completeness_marker(text),
        None => object.values().filter_map(Value::as_str).any(is_completeness_marker) && object.len() == 1,
    }
}

/// Question text from a model value: a string, or a list of suggestions
fn question_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty() && !is_completeness_marker(text)).then(|| text.to_string())
        }
        Value::Array(items) => {
            let suggestions: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if suggestions.is_empty() {
                return None;
            }
            let bullets: Vec<String> = suggestions.iter().map(|s| format!("- {}", s)).collect();
            Some(format!(
                "Pick any of these suggestions or describe your own:\n{}",
                bullets.join("\n")
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::pipeline::test_support::{record, services};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    const NP: &str = "Not provided";

    fn stage(mock: Arc<MockLlmClient>) -> QuestionStage {
        QuestionStage::new(services(mock), 1024)
    }

    fn only(key: &str, text: &str) -> ClarificationSet {
        let mut q = IndexMap::new();
        q.insert(key.to_string(), text.to_string());
        ClarificationSet::Questions(q)
    }

    #[tokio::test]
    async fn test_complete_record_yields_marker_from_model() {
        let mock = Arc::new(MockLlmClient::texts(&["{\"result\": \"No additional questions needed.\"}"]));
        let set = stage(mock.clone()).ask(&record(&[("a", "foo"), ("b", "bar")])).await;
        assert_eq!(set, ClarificationSet::Complete);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_garbage_output_uses_fallback() {
        let mock = Arc::new(MockLlmClient::texts(&["I'm sorry, I cannot help with that"]));
        let set = stage(mock).ask(&record(&[("a", NP), ("b", "bar")])).await;
        assert_eq!(set, only("a", "Please provide information for: a"));
    }

    #[tokio::test]
    async fn test_service_failure_uses_fallback() {
        let mock = Arc::new(MockLlmClient::new(vec![MockReply::Fail(500)]));
        let set = stage(mock).ask(&record(&[("a", NP), ("b", NP)])).await;
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.questions().unwrap().get("b").map(String::as_str),
            Some("Please provide information for: b")
        );
    }

    #[tokio::test]
    async fn test_timeout_uses_fallback() {
        let mock = Arc::new(MockLlmClient::new(vec![MockReply::Hang(Duration::from_millis(500))]));
        let mut svc = services(mock.clone());
        svc.timeout = Duration::from_millis(20);
        let stage = QuestionStage::new(svc, 1024);

        let set = stage.ask(&record(&[("a", NP), ("b", "bar"), ("c", NP)])).await;
        let mut expected = IndexMap::new();
        expected.insert("a".to_string(), "Please provide information for: a".to_string());
        expected.insert("c".to_string(), "Please provide information for: c".to_string());
        assert_eq!(set, ClarificationSet::Questions(expected));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_questions_are_kept_in_record_order() {
        let mock = Arc::new(MockLlmClient::texts(&[
            "{\"c\": \"What else?\", \"a\": \"What is it?\", \"b\": \"ignored, already answered\"}",
        ]));
        let set = stage(mock).ask(&record(&[("a", NP), ("b", "bar"), ("c", NP)])).await;
        let questions = set.questions().unwrap();
        assert_eq!(questions.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(questions["a"], "What is it?");
        assert_eq!(questions["c"], "What else?");
    }

    #[test]
    fn test_partial_coverage_fills_with_fallback() {
        let rec = record(&[("a", NP), ("b", NP)]);
        let set = QuestionStage::interpret(&rec, "{\"A\": \"What is the app?\"}").unwrap();
        let questions = set.questions().unwrap();
        assert_eq!(questions["a"], "What is the app?");
        assert_eq!(questions["b"], "Please provide information for: b");
    }

    #[test]
    fn test_suggestion_lists_become_bullets() {
        let rec = record(&[("extras", NP)]);
        let set = QuestionStage::interpret(&rec, "{\"extras\": [\"Live chat\", \"Loyalty points\", \"\"]}").unwrap();
        assert_eq!(
            set.questions().unwrap()["extras"],
            "Pick any of these suggestions or describe your own:\n- Live chat\n- Loyalty points"
        );
    }

    #[test]
    fn test_unusable_model_output_is_rejected() {
        let rec = record(&[("a", NP), ("b", "bar")]);
        // every value empty
        assert!(QuestionStage::interpret(&rec, "{\"a\": \"\", \"b\": null}").is_none());
        // completeness claimed while `a` is unresolved
        assert!(QuestionStage::interpret(&rec, "{\"result\": \"No additional questions needed.\"}").is_none());
        // only asks about keys that are not open
        assert!(QuestionStage::interpret(&rec, "{\"b\": \"Why bar?\", \"zzz\": \"?\"}").is_none());
        // no JSON at all
        assert!(QuestionStage::interpret(&rec, "no braces").is_none());
    }

    #[test]
    fn test_completeness_marker_variants() {
        let rec = record(&[("a", "foo")]);
        for raw in [
            "{\"result\": \"No additional questions needed.\"}",
            "{\"Result\": \"no additional questions needed\"}",
            "```json\n{\"result\": \"No further questions needed\"}\n```",
        ] {
            assert_eq!(QuestionStage::interpret(&rec, raw), Some(ClarificationSet::Complete), "raw = {}", raw);
        }
    }

    #[test]
    fn test_fallback_on_complete_record() {
        assert_eq!(QuestionStage::fallback(&record(&[("a", "foo")])), ClarificationSet::Complete);
    }

    proptest! {
        #[test]
        fn prop_ask_is_total(
            values in prop::collection::vec(prop_oneof![Just(NP.to_string()), "[a-z]{1,8}"], 0..5),
            garbage in ".{0,80}",
        ) {
            let pairs: Vec<(String, String)> = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (format!("key{}", i), v))
                .collect();
            let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let rec = record(&borrowed);

            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let mock = Arc::new(MockLlmClient::texts(&[garbage.as_str()]));
            let set = runtime.block_on(stage(mock).ask(&rec));

            match &set {
                ClarificationSet::Complete => prop_assert!(rec.is_complete()),
                ClarificationSet::Questions(q) => {
                    prop_assert!(!q.is_empty());
                    let keys: Vec<&str> = q.keys().map(String::as_str).collect();
                    prop_assert_eq!(keys, rec.unresolved_keys());
                }
            }
        }
    }
}
