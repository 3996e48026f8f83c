use crate::error::{LoadError, QbankError, Result};
use globset::{Glob, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// One exam question as stored in a dataset file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: String,
    #[serde(default)]
    pub number: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Times this question was observed across sources; absent means 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Only set on records produced by merging a duplicate group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<usize>,
    /// Only set on records produced by merging a duplicate group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<u32>,
    /// Keys this tool does not interpret (options, explanations, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuestionRecord {
    pub fn new(id: impl Into<String>, number: u32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number,
            text: text.into(),
            correct_answer: None,
            frequency: None,
            image: None,
            source_file: None,
            duplicate_count: None,
            confidence_score: None,
            extra: Map::new(),
        }
    }

    /// Effective frequency, defaulting to 1 when the field is missing.
    pub fn frequency(&self) -> u32 {
        self.frequency.unwrap_or(1)
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().map_or(false, |s| !s.is_empty())
    }

    pub fn answer(&self) -> &str {
        self.correct_answer.as_deref().unwrap_or("")
    }
}

/// A question file: the records plus whatever metadata travels with them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub questions: Vec<QuestionRecord>,
    #[serde(rename = "totalQuestions", default)]
    pub total_questions: usize,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Dataset {
    pub fn new(questions: Vec<QuestionRecord>) -> Self {
        let mut dataset = Self {
            questions,
            total_questions: 0,
            metadata: Map::new(),
        };
        dataset.refresh_total();
        dataset
    }

    pub fn refresh_total(&mut self) {
        self.total_questions = self.questions.len();
    }
}

/// Name recorded as a record's `sourceFile` and in `mergedFrom`.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("yaml") | Some("yml")
    )
}

/// Load and schema-check one dataset file (JSON, or YAML by extension).
pub fn load_dataset(path: &Path) -> std::result::Result<Dataset, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    let schema_error = |reason: String| LoadError::Schema {
        path: path.to_path_buf(),
        reason,
    };

    match value.as_object() {
        None => return Err(schema_error("top level is not an object".to_string())),
        Some(obj) => match obj.get("questions") {
            Some(Value::Array(_)) => {}
            Some(_) => return Err(schema_error("'questions' is not an array".to_string())),
            None => return Err(schema_error("missing 'questions' array".to_string())),
        },
    }

    let dataset: Dataset =
        serde_json::from_value(value).map_err(|e| schema_error(e.to_string()))?;

    debug!(path = %path.display(), questions = dataset.questions.len(), "loaded dataset");
    Ok(dataset)
}

/// Serialize `dataset` to `path` in one step.
///
/// The JSON goes to a uniquely named temporary file in the target's directory
/// and is renamed over the target, so an interrupted run never leaves a
/// half-written file behind. The temporary file is removed on failure.
pub fn save_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(dataset)?;

    let write_err = |source: std::io::Error| QbankError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!(path = %path.display(), questions = dataset.questions.len(), "dataset written");
    Ok(())
}

/// Resolve a file or directory argument to the dataset files to process.
///
/// A file is returned as-is. A directory is scanned one level deep for file
/// names matching any of `patterns`; results are sorted by path.
pub fn discover_sources(path: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    let globs = builder.build()?;

    let mut walker = WalkBuilder::new(path);
    walker.max_depth(Some(1)).hidden(true).git_ignore(true).git_global(true);

    let mut files: Vec<PathBuf> = walker
        .build()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().map_or(false, |n| globs.is_match(n)))
        .collect();

    files.sort();
    Ok(files)
}
