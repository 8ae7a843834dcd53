//! Reference data - the technology tag vocabulary and timeline estimates
//!
//! Both are loaded once at startup and shared read-only (`Arc<ReferenceData>`)
//! by every proposal request.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReferenceConfig;

/// Errors from loading reference data
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Tag vocabulary not found at {0}")]
    TagsMissing(PathBuf),

    #[error("Tag vocabulary at {0} contains no tags")]
    TagsEmpty(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse timeline estimates {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Immutable reference data passed into the proposal prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    /// Technology tag vocabulary, in file order
    pub tags: Vec<String>,
    /// Timeline estimate rows as a JSON array of objects
    pub timeline: Option<Value>,
}

impl ReferenceData {
    pub fn new(tags: Vec<String>, timeline: Option<Value>) -> Self {
        Self { tags, timeline }
    }

    /// Load everything named by the configuration
    pub fn load(config: &ReferenceConfig) -> Result<Self, ReferenceError> {
        debug!(?config, "ReferenceData::load: called");
        let tags = load_tags(&config.tags_file)?;
        let timeline = match &config.timeline_file {
            Some(path) if path.exists() => Some(load_timeline(path)?),
            Some(path) => {
                warn!(path = %path.display(), "Timeline estimates not found, proposing without them");
                None
            }
            None => None,
        };
        info!(
            tag_count = tags.len(),
            has_timeline = timeline.is_some(),
            "Loaded reference data"
        );
        Ok(Self { tags, timeline })
    }

    /// Tags as the comma-joined list the proposal prompt expects
    pub fn tags_csv(&self) -> String {
        self.tags.join(", ")
    }

    /// Timeline rows serialized for the proposal prompt
    pub fn timeline_json(&self) -> Option<String> {
        self.timeline.as_ref().map(Value::to_string)
    }
}

/// Load the newline-delimited tag vocabulary
pub fn load_tags(path: &Path) -> Result<Vec<String>, ReferenceError> {
    debug!(path = %path.display(), "load_tags: called");
    if !path.exists() {
        return Err(ReferenceError::TagsMissing(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let tags: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if tags.is_empty() {
        return Err(ReferenceError::TagsEmpty(path.to_path_buf()));
    }
    debug!(tag_count = tags.len(), "load_tags: loaded");
    Ok(tags)
}

/// Load the timeline CSV into a JSON array of row objects
///
/// Rows whose cells are all blank are dropped. Blank cells become `""` and
/// numeric cells become JSON numbers.
pub fn load_timeline(path: &Path) -> Result<Value, ReferenceError> {
    debug!(path = %path.display(), "load_timeline: called");
    let csv_err = |source| ReferenceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.to_string(), cell_value(record.get(idx).unwrap_or(""))))
            .collect();
        rows.push(Value::Object(row));
    }

    debug!(row_count = rows.len(), "load_timeline: loaded");
    Ok(Value::Array(rows))
}

fn cell_value(cell: &str) -> Value {
    if let Ok(n) = cell.parse::<i64>() {
        return Value::Number(n.into());
    }
    match cell.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_tags_trims_and_skips_blanks() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tags.txt", "Rust\n\n  React  \r\nPostgreSQL\n   \n");
        assert_eq!(load_tags(&path).unwrap(), vec!["Rust", "React", "PostgreSQL"]);
    }

    #[test]
    fn test_load_tags_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(matches!(load_tags(&missing), Err(ReferenceError::TagsMissing(_))));

        let empty = write(&dir, "empty.txt", "\n  \n");
        assert!(matches!(load_tags(&empty), Err(ReferenceError::TagsEmpty(_))));
    }

    #[test]
    fn test_load_timeline_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "timeline.csv",
            "Feature,Frontend,Backend,Notes\nLogin,8,12.5,\n,,,\nSearch,6\n",
        );
        let timeline = load_timeline(&path).unwrap();
        assert_eq!(
            timeline,
            serde_json::json!([
                {"Feature": "Login", "Frontend": 8, "Backend": 12.5, "Notes": ""},
                {"Feature": "Search", "Frontend": 6, "Backend": "", "Notes": ""}
            ])
        );
    }

    #[test]
    fn test_load_with_missing_timeline_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let tags = write(&dir, "tags.txt", "Rust\nAxum\n");
        let config = ReferenceConfig {
            tags_file: tags,
            timeline_file: Some(dir.path().join("missing.csv")),
        };
        let data = ReferenceData::load(&config).unwrap();
        assert_eq!(data.tags_csv(), "Rust, Axum");
        assert!(data.timeline_json().is_none());
    }

    #[test]
    fn test_load_fails_without_tags() {
        let dir = TempDir::new().unwrap();
        let config = ReferenceConfig {
            tags_file: dir.path().join("tags.txt"),
            timeline_file: None,
        };
        assert!(matches!(
            ReferenceData::load(&config),
            Err(ReferenceError::TagsMissing(_))
        ));
    }
}
