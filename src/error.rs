use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn one source file into a dataset.
///
/// Never fatal to a batch: callers log it and move on to the next source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{} is not a question dataset: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },
}

impl LoadError {
    /// The source file that failed to load.
    pub fn path(&self) -> &PathBuf {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Json { path, .. }
            | LoadError::Yaml { path, .. }
            | LoadError::Schema { path, .. } => path,
        }
    }
}

/// Invalid request, reported before any work is done.
#[derive(Debug, Error, PartialEq)]
pub enum UsageError {
    #[error("similarity threshold must be in (0.0, 1.0], got {0}")]
    InvalidThreshold(f64),
    #[error("unknown grouping strategy '{0}' (expected 'anchor' or 'transitive')")]
    UnknownStrategy(String),
    #[error("--output is required for merge")]
    MissingOutput,
    #[error("no source files given")]
    NoSources,
    #[error("renumber prefix must not be empty")]
    EmptyPrefix,
}

#[derive(Debug, Error)]
pub enum QbankError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("cannot read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid source pattern: {0}")]
    Pattern(#[from] globset::Error),
    #[error("cannot serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QbankError>;
