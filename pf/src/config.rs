//! ProposalForge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main ProposalForge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Pipeline stage configuration
    pub pipeline: PipelineConfig,

    /// Reference data sources
    pub reference: ReferenceConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Default log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set and the extraction
    /// schema is usable. Call this early to fail fast with clear messages.
    pub fn validate(&self) -> Result<()> {
        self.llm.get_api_key()?;

        let mut seen = std::collections::HashSet::new();
        for field in &self.pipeline.fields {
            if field.key.trim().is_empty() {
                return Err(eyre::eyre!("pipeline.fields contains an empty key"));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(eyre::eyre!("pipeline.fields contains duplicate key '{}'", field.key));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .proposalforge.yml
        let local_config = PathBuf::from(".proposalforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/proposalforge/proposalforge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("proposalforge").join("proposalforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is initialized
    ///
    /// Errors are swallowed: a broken config is reported properly by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".proposalforge.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("proposalforge").join("proposalforge.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Provider-side cap on tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Transient HTTP failures retried inside the provider
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 120_000,
            temperature: 0.001,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }

    /// Request-level timeout for one completion
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// One entry of the extraction schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Question label used as the record key at every stage
    pub key: String,

    /// Extra guidance for the model when filling this field
    #[serde(default)]
    pub hint: Option<String>,
}

impl FieldConfig {
    pub fn new(key: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            key: key.into(),
            hint: hint.map(str::to_string),
        }
    }
}

/// Pipeline stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extraction schema, in record order. Empty means keep whatever keys the model returns.
    pub fields: Vec<FieldConfig>,

    /// Max tokens for the extraction call
    #[serde(rename = "extraction-max-tokens")]
    pub extraction_max_tokens: u32,

    /// Max tokens for the question call
    #[serde(rename = "question-max-tokens")]
    pub question_max_tokens: u32,

    /// Max tokens for the proposal call
    #[serde(rename = "proposal-max-tokens")]
    pub proposal_max_tokens: u32,

    /// Ask for the proposal as JSON and parse it
    #[serde(rename = "structured-output")]
    pub structured_output: bool,

    /// Clarification round-trips accepted before proposing with what we have
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldConfig::new("What is the project to build?", None),
                FieldConfig::new(
                    "What are the features to add in the project?",
                    Some("comma separated, 2-3 words per feature"),
                ),
                FieldConfig::new(
                    "What are the additional features that you want to add?",
                    Some("comma separated, 2-3 words per feature"),
                ),
            ],
            extraction_max_tokens: 2048,
            question_max_tokens: 2048,
            proposal_max_tokens: 30000,
            structured_output: false,
            max_rounds: 1,
        }
    }
}

/// Reference data sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Newline-delimited technology tag vocabulary (required)
    #[serde(rename = "tags-file")]
    pub tags_file: PathBuf,

    /// CSV of timeline estimates (optional)
    #[serde(rename = "timeline-file")]
    pub timeline_file: Option<PathBuf>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            tags_file: PathBuf::from("tags-database.txt"),
            timeline_file: Some(PathBuf::from("timeline-estimates.csv")),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP API to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}
