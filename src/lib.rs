//! qbank - curate exam question banks collected from several sources.
//!
//! The pipeline normalizes question text, scores pairwise similarity,
//! groups near-duplicates and merges each group into one record whose
//! frequency and confidence reflect how often the question was seen.

pub mod config;
pub mod dataset;
pub mod error;
pub mod group;
pub mod merge;
pub mod normalize;
pub mod renumber;
pub mod similarity;
pub mod stats;

pub use config::Config;
pub use dataset::{
    discover_sources, load_dataset, save_dataset, source_name, Dataset, QuestionRecord,
};
pub use error::{LoadError, QbankError, UsageError};
pub use group::{find_groups, group, GroupOptions, Strategy, Threshold};
pub use merge::{dedupe_records, merge_files, merge_group, MergeReport};
pub use normalize::{fingerprint, normalize};
pub use renumber::renumber;
pub use similarity::similarity;
pub use stats::{
    analyze_dataset, analyze_file, compute_stats, AnalysisOptions, AnalysisReport, Stats,
};
