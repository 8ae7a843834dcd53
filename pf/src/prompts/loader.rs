//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::embedded;

/// Errors from loading or rendering a prompt template
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.proposalforge/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader rooted at `base`
    ///
    /// Looks for `.proposalforge/prompts/` and `prompts/` under `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        debug!(?base, "PromptLoader::new: called");
        let user_dir = base.join(".proposalforge/prompts");
        let repo_dir = base.join("prompts");

        let user_dir_exists = user_dir.is_dir();
        let repo_dir_exists = repo_dir.is_dir();
        debug!(
            ?user_dir,
            %user_dir_exists,
            ?repo_dir,
            %repo_dir_exists,
            "PromptLoader::new: checking directories"
        );

        Self {
            hbs: Self::engine(),
            user_dir: user_dir_exists.then_some(user_dir),
            repo_dir: repo_dir_exists.then_some(repo_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes in embedded JSON
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.proposalforge/prompts/{name}.pmt`
    /// 2. Repo default: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    pub fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.is_file() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
            debug!(?path, "PromptLoader::load_template: not found");
        }

        debug!("PromptLoader::load_template: trying embedded fallback");
        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String, PromptError> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        let rendered = self
            .hbs
            .render_template(&template, context)
            .map_err(|source| PromptError::Render {
                name: template_name.to_string(),
                source: Box::new(source),
            })?;
        info!(template = %template_name, prompt_len = rendered.len(), "Rendered prompt template");
        Ok(rendered)
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}
