use crate::error::{QbankError, Result, UsageError};
use crate::group::{GroupOptions, Strategy, Threshold, DEFAULT_THRESHOLD};
use crate::stats::{AnalysisOptions, DEFAULT_HIGH_FREQUENCY};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Settings read from `.qbank.toml`. Every field has a default, so a missing
/// file or a partial file is fine; command-line flags override these.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub grouping: GroupingConfig,
    pub report: ReportConfig,
    pub sources: SourcesConfig,
    pub renumber: RenumberConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GroupingConfig {
    pub threshold: f64,
    pub strategy: Strategy,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            strategy: Strategy::Anchor,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub high_frequency_min: u32,
    /// Characters of question text shown per group member.
    pub preview_chars: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            high_frequency_min: DEFAULT_HIGH_FREQUENCY,
            preview_chars: 60,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// File name globs picked up when a directory is analyzed.
    pub include: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            include: vec!["*.json".to_string(), "*.yaml".to_string(), "*.yml".to_string()],
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RenumberConfig {
    pub prefix: Option<String>,
}

impl Config {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(QbankError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| QbankError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Grouping settings with optional command-line overrides applied.
    pub fn group_options(
        &self,
        threshold: Option<f64>,
        strategy: Option<Strategy>,
    ) -> std::result::Result<GroupOptions, UsageError> {
        Ok(GroupOptions {
            threshold: Threshold::new(threshold.unwrap_or(self.grouping.threshold))?,
            strategy: strategy.unwrap_or(self.grouping.strategy),
        })
    }

    pub fn analysis_options(
        &self,
        threshold: Option<f64>,
        strategy: Option<Strategy>,
    ) -> std::result::Result<AnalysisOptions, UsageError> {
        Ok(AnalysisOptions {
            grouping: self.group_options(threshold, strategy)?,
            high_frequency_min: self.report.high_frequency_min,
        })
    }
}
