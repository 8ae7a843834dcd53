//! ExtractionStage - free text to an initial InformationRecord

use tracing::{debug, info, warn};

use super::{PipelineError, Services, StageCause};
use crate::config::FieldConfig;
use crate::domain::{FieldValue, InformationRecord};
use crate::prompts::{self, ExtractionContext};
use crate::response::parse_record;

const STAGE: &str = "extraction";

/// Declared list of fields the extraction stage asks for
///
/// The keys are the record keys at every later stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSchema {
    fields: Vec<FieldConfig>,
}

impl ExtractionSchema {
    pub fn new(fields: Vec<FieldConfig>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldConfig] {
        &self.fields
    }

    /// Reshape a parsed record onto the schema
    ///
    /// The result holds exactly the schema keys, in schema order. A model key
    /// matches a schema key exactly or, failing that, ignoring case and
    /// punctuation drift. Schema keys the model left out are unresolved; keys
    /// the schema does not declare are dropped. An empty schema keeps the
    /// model's keys as they are.
    pub fn conform(&self, parsed: InformationRecord) -> InformationRecord {
        debug!(parsed_len = parsed.len(), schema_len = self.fields.len(), "ExtractionSchema::conform: called");
        if self.fields.is_empty() {
            return parsed;
        }

        let record: InformationRecord = self
            .fields
            .iter()
            .map(|field| {
                let value = parsed
                    .find_key(&field.key)
                    .and_then(|k| parsed.get(k))
                    .cloned()
                    .unwrap_or(FieldValue::NotProvided);
                (field.key.clone(), value)
            })
            .collect();

        let dropped: Vec<&str> = parsed
            .keys()
            .filter(|k| record.find_key(k).is_none())
            .collect();
        if !dropped.is_empty() {
            warn!(?dropped, "Dropping keys the extraction schema does not declare");
        }
        record
    }
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::new(crate::config::PipelineConfig::default().fields)
    }
}

/// Turns the user's project idea into an InformationRecord with one model call
#[derive(Debug, Clone)]
pub struct ExtractionStage {
    services: Services,
    schema: ExtractionSchema,
    max_tokens: u32,
}

impl ExtractionStage {
    pub fn new(services: Services, schema: ExtractionSchema, max_tokens: u32) -> Self {
        Self {
            services,
            schema,
            max_tokens,
        }
    }

    /// Extract the schema fields from `user_text`
    ///
    /// Single attempt. Unparseable output fails the stage.
    pub async fn extract(&self, user_text: &str) -> Result<InformationRecord, PipelineError> {
        debug!(text_len = user_text.len(), "ExtractionStage::extract: called");
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let context = ExtractionContext::new(user_text, self.schema.fields());
        let prompt = self
            .services
            .prompts
            .render(prompts::EXTRACT, &context)
            .map_err(|e| PipelineError::ExtractionFailed(StageCause::Prompt(e)))?;

        let raw = self
            .services
            .complete(prompt, self.max_tokens)
            .await
            .map_err(|e| PipelineError::from_completion(STAGE, e, PipelineError::ExtractionFailed))?;

        let parsed = parse_record(&raw).map_err(|e| {
            warn!(error = %e, "Extraction output could not be parsed");
            PipelineError::ExtractionFailed(StageCause::Parse(e))
        })?;

        let record = self.schema.conform(parsed);
        info!(
            field_count = record.len(),
            unresolved = record.unresolved_keys().len(),
            "Extracted information record"
        );
        Ok(record)
    }
}
