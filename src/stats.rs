use crate::dataset::{load_dataset, source_name, Dataset, QuestionRecord};
use crate::error::LoadError;
use crate::group::{find_groups, GroupOptions};
use crate::normalize::fingerprint;
use crate::similarity::similarity;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_HIGH_FREQUENCY: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    pub grouping: GroupOptions,
    /// Records with at least this frequency count as high frequency.
    pub high_frequency_min: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            grouping: GroupOptions::default(),
            high_frequency_min: DEFAULT_HIGH_FREQUENCY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub unique: usize,
    pub duplicate_groups: usize,
    pub high_frequency: usize,
    pub with_images: usize,
    /// Records whose normalized text and answer repeat an earlier record.
    pub exact_duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub id: String,
    pub number: u32,
    pub text: String,
    pub frequency: u32,
    pub source_file: Option<String>,
    /// Similarity to the group's first member.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub file: String,
    pub stats: Stats,
    pub duplicates: Vec<Vec<GroupMember>>,
}

/// Statistics over the raw records of `dataset`.
pub fn compute_stats(dataset: &Dataset, options: &AnalysisOptions) -> Stats {
    let groups = find_groups(&dataset.questions, &options.grouping);
    stats_from_groups(&dataset.questions, &groups, options)
}

fn stats_from_groups(
    records: &[QuestionRecord],
    groups: &[Vec<usize>],
    options: &AnalysisOptions,
) -> Stats {
    let duplicate_groups: Vec<&Vec<usize>> = groups.iter().filter(|g| g.len() > 1).collect();
    let folded: usize = duplicate_groups.iter().map(|g| g.len() - 1).sum();

    let mut fingerprints = HashSet::new();
    let exact_duplicates = records
        .iter()
        .filter(|r| !fingerprints.insert(fingerprint(&r.text, r.answer())))
        .count();

    Stats {
        total: records.len(),
        unique: records.len() - folded,
        duplicate_groups: duplicate_groups.len(),
        high_frequency: records
            .iter()
            .filter(|r| r.frequency() >= options.high_frequency_min)
            .count(),
        with_images: records.iter().filter(|r| r.has_image()).count(),
        exact_duplicates,
    }
}

/// Statistics plus the duplicate groups themselves, for one named dataset.
pub fn analyze_dataset(name: &str, dataset: &Dataset, options: &AnalysisOptions) -> AnalysisReport {
    let records = &dataset.questions;
    let groups = find_groups(records, &options.grouping);
    let stats = stats_from_groups(records, &groups, options);

    let duplicates = groups
        .iter()
        .filter(|g| g.len() > 1)
        .map(|g| {
            let anchor = &records[g[0]];
            g.iter()
                .map(|&i| {
                    let r = &records[i];
                    GroupMember {
                        id: r.id.clone(),
                        number: r.number,
                        text: r.text.clone(),
                        frequency: r.frequency(),
                        source_file: r.source_file.clone(),
                        similarity: if i == g[0] { 1.0 } else { similarity(&anchor.text, &r.text) },
                    }
                })
                .collect()
        })
        .collect();

    AnalysisReport {
        file: name.to_string(),
        stats,
        duplicates,
    }
}

/// Load and analyze one file.
pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<AnalysisReport, LoadError> {
    let dataset = load_dataset(path)?;
    Ok(analyze_dataset(&source_name(path), &dataset, options))
}
