//! MergeStage - fold submitted answers into the record

use std::collections::HashMap;

use tracing::{debug, info};

use crate::domain::{AuditEntry, AuditLog, FieldValue, InformationRecord};

/// Merge user answers into the unresolved fields of `previous`
///
/// Only unresolved fields change, and only to an answer the caller supplied.
/// Every unresolved field gets one audit entry, in record order; a missing,
/// blank or "Not provided" answer is audited with an empty answer and the field
/// stays unresolved. Resolved fields pass through untouched and are not audited.
pub fn merge(previous: &InformationRecord, answers: &HashMap<String, String>) -> (AuditLog, InformationRecord) {
    debug!(
        field_count = previous.len(),
        answer_count = answers.len(),
        "merge: called"
    );
    let mut audit = AuditLog::new();
    let mut record = InformationRecord::new();

    for (key, value) in previous.iter() {
        if value.is_resolved() {
            record.insert(key, value.clone());
            continue;
        }

        let submitted = answers.get(key).map(|a| FieldValue::parse(a)).unwrap_or(FieldValue::NotProvided);
        audit.push(AuditEntry::new(key, submitted.answer().unwrap_or_default()));
        record.insert(key, submitted);
    }

    info!(
        answered = audit.entries().iter().filter(|e| e.is_answered()).count(),
        still_unresolved = record.unresolved_keys().len(),
        "Merged clarification answers"
    );
    (audit, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::record;
    use proptest::prelude::*;

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_fills_unresolved_field() {
        let previous = record(&[("a", "Not provided"), ("b", "x")]);
        let (audit, merged) = merge(&previous, &answers(&[("a", "answer-a")]));

        assert_eq!(merged, record(&[("a", "answer-a"), ("b", "x")]));
        assert_eq!(audit.lines(), vec!["Q: a\nA: answer-a".to_string()]);
    }

    #[test]
    fn test_missing_answer_is_audited_empty() {
        let previous = record(&[("a", "Not provided"), ("b", "Not provided"), ("c", "kept")]);
        let (audit, merged) = merge(&previous, &answers(&[("b", "answer-b")]));

        assert_eq!(audit.lines(), vec!["Q: a\nA: ".to_string(), "Q: b\nA: answer-b".to_string()]);
        assert_eq!(merged.unresolved_keys(), vec!["a"]);
        assert_eq!(merged.get("c").and_then(FieldValue::answer), Some("kept"));
    }

    #[test]
    fn test_blank_and_sentinel_answers_count_as_absent() {
        let previous = record(&[("a", "Not provided"), ("b", "Not provided")]);
        let (audit, merged) = merge(&previous, &answers(&[("a", "   "), ("b", "not provided.")]));

        assert!(audit.entries().iter().all(|e| !e.is_answered()));
        assert_eq!(merged.unresolved_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_answers_for_resolved_fields_are_ignored() {
        let previous = record(&[("a", "original")]);
        let (audit, merged) = merge(&previous, &answers(&[("a", "overwrite attempt"), ("z", "stray")]));

        assert!(audit.is_empty());
        assert_eq!(merged, previous);
    }

    fn arb_record() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(
            ("[a-z]{1,6}", prop_oneof![Just("Not provided".to_string()), "[a-z ]{1,10}"]),
            0..8,
        )
    }

    proptest! {
        #[test]
        fn prop_merge_preserves_keys_and_resolved_values(
            pairs in arb_record(),
            submitted in prop::collection::hash_map("[a-z]{1,6}", "[a-z ]{0,10}", 0..8),
        ) {
            let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let previous = record(&borrowed);
            let (audit, merged) = merge(&previous, &submitted);

            prop_assert_eq!(merged.keys().collect::<Vec<_>>(), previous.keys().collect::<Vec<_>>());
            for (key, value) in previous.iter() {
                let after = merged.get(key).unwrap();
                if value.is_resolved() {
                    prop_assert_eq!(after, value);
                } else if let Some(answer) = after.answer() {
                    prop_assert_eq!(Some(answer), submitted.get(key).map(|s| s.trim()));
                }
            }
            prop_assert_eq!(audit.len(), previous.unresolved_keys().len());
        }
    }
}
