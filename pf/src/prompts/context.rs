//! Render contexts for each prompt template

use serde::Serialize;

use crate::config::FieldConfig;
use crate::domain::{InformationRecord, NO_QUESTIONS_NEEDED, NOT_PROVIDED, RESULT_KEY};

/// One schema field as shown to the model
#[derive(Debug, Clone, Serialize)]
pub struct FieldPrompt {
    pub number: usize,
    pub key: String,
    pub hint: Option<String>,
}

/// Context for the `extract` template
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionContext {
    pub user_input: String,
    pub fields: Vec<FieldPrompt>,
    pub not_provided: &'static str,
}

impl ExtractionContext {
    pub fn new(user_input: &str, fields: &[FieldConfig]) -> Self {
        Self {
            user_input: user_input.to_string(),
            fields: fields
                .iter()
                .enumerate()
                .map(|(idx, f)| FieldPrompt {
                    number: idx + 1,
                    key: f.key.clone(),
                    hint: f.hint.clone(),
                })
                .collect(),
            not_provided: NOT_PROVIDED,
        }
    }
}

/// Context for the `questions` template
#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub extracted_info: String,
    pub not_provided: &'static str,
    pub result_key: &'static str,
    pub complete_marker: &'static str,
}

impl QuestionContext {
    pub fn new(record: &InformationRecord) -> Self {
        Self {
            extracted_info: record.to_prompt_json(),
            not_provided: NOT_PROVIDED,
            result_key: RESULT_KEY,
            complete_marker: NO_QUESTIONS_NEEDED,
        }
    }
}

/// Context for the `proposal` template
#[derive(Debug, Clone, Serialize)]
pub struct ProposalContext {
    pub all_info: String,
    pub all_tags: String,
    pub timeline_data: Option<String>,
    pub structured_output: bool,
}
