use crate::dataset::{load_dataset, source_name, Dataset, QuestionRecord};
use crate::error::UsageError;
use crate::group::{find_groups, GroupOptions};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

/// Confidence derived from how often a question was seen, capped at 100.
pub fn confidence_score(frequency: u32) -> u32 {
    frequency.saturating_mul(10).min(100)
}

/// Collapse one duplicate group into a single record.
///
/// The member seen most often (first one on ties) becomes the base and keeps
/// its id, text, image and source. Frequencies are summed and the record is
/// tagged with the group size and a confidence score. A group of one comes
/// back untouched; an empty group yields `None`.
pub fn merge_group(group: &[&QuestionRecord]) -> Option<QuestionRecord> {
    let base = group
        .iter()
        .copied()
        .reduce(|best, r| if r.frequency() > best.frequency() { r } else { best })?;

    if group.len() == 1 {
        return Some(base.clone());
    }

    let total: u32 = group.iter().map(|r| r.frequency()).fold(0, u32::saturating_add);

    let mut merged = base.clone();
    merged.frequency = Some(total);
    merged.duplicate_count = Some(group.len());
    merged.confidence_score = Some(confidence_score(total));
    Some(merged)
}

/// Order records by frequency (highest first), then by number.
pub fn sort_by_frequency(records: &mut [QuestionRecord]) {
    records.sort_by(|a, b| {
        b.frequency()
            .cmp(&a.frequency())
            .then_with(|| a.number.cmp(&b.number))
    });
}

/// Group `records`, replace every duplicate group with its merged record and
/// sort the result. Returns the records and the number of duplicate groups.
///
/// Group membership is tracked by position, so records from different files
/// that happen to share an id are never confused with each other.
pub fn dedupe_records(
    records: Vec<QuestionRecord>,
    options: &GroupOptions,
) -> (Vec<QuestionRecord>, usize) {
    let groups = find_groups(&records, options);

    let mut merged = Vec::new();
    let mut singles = Vec::new();
    let mut duplicate_groups = 0;

    for members in &groups {
        let refs: Vec<&QuestionRecord> = members.iter().map(|&i| &records[i]).collect();
        if members.len() > 1 {
            duplicate_groups += 1;
            merged.extend(merge_group(&refs));
        } else {
            singles.extend(merge_group(&refs));
        }
    }

    merged.extend(singles);
    sort_by_frequency(&mut merged);
    (merged, duplicate_groups)
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedSource {
    pub name: String,
    pub questions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSource {
    pub name: String,
    pub reason: String,
}

/// Outcome of merging several sources: the dataset to write plus the counts
/// a caller needs to report what happened.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub dataset: Dataset,
    pub loaded: Vec<LoadedSource>,
    pub skipped: Vec<SkippedSource>,
    pub input_questions: usize,
    pub duplicate_groups: usize,
}

/// Merge several dataset files into one deduplicated, ranked dataset.
///
/// Sources that fail to load are skipped and listed in the report. Metadata
/// comes from the first source that loads. Nothing is written here; the
/// caller persists `report.dataset` once this returns.
pub fn merge_files(sources: &[PathBuf], options: &GroupOptions) -> Result<MergeReport, UsageError> {
    if sources.is_empty() {
        return Err(UsageError::NoSources);
    }

    let mut all_questions: Vec<QuestionRecord> = Vec::new();
    let mut metadata = None;
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();

    for path in sources {
        let name = source_name(path);
        match load_dataset(path) {
            Ok(dataset) => {
                info!(source = %name, questions = dataset.questions.len(), "loaded source");
                loaded.push(LoadedSource {
                    name: name.clone(),
                    questions: dataset.questions.len(),
                });

                if metadata.is_none() {
                    metadata = Some(dataset.metadata);
                }

                all_questions.extend(dataset.questions.into_iter().map(|mut q| {
                    q.source_file = Some(name.clone());
                    q
                }));
            }
            Err(e) => {
                warn!(path = %e.path().display(), error = %e, "skipping source");
                skipped.push(SkippedSource {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let input_questions = all_questions.len();
    let (questions, duplicate_groups) = dedupe_records(all_questions, options);

    let mut dataset = Dataset {
        questions,
        total_questions: 0,
        metadata: metadata.unwrap_or_default(),
    };
    dataset.refresh_total();
    dataset.metadata.insert(
        "mergedFrom".to_string(),
        Value::Array(sources.iter().map(|p| Value::String(source_name(p))).collect()),
    );
    dataset
        .metadata
        .insert("mergedAt".to_string(), Value::String(chrono_now()));

    info!(
        input = input_questions,
        output = dataset.total_questions,
        duplicate_groups,
        "merge complete"
    );

    Ok(MergeReport {
        dataset,
        loaded,
        skipped,
        input_questions,
        duplicate_groups,
    })
}

fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::group::{Strategy, Threshold};

    fn question(id: &str, number: u32, text: &str, frequency: Option<u32>) -> QuestionRecord {
        let mut q = QuestionRecord::new(id, number, text);
        q.frequency = frequency;
        q
    }

    #[test]
    fn test_confidence_score() {
        assert_eq!(confidence_score(0), 0);
        assert_eq!(confidence_score(5), 50);
        assert_eq!(confidence_score(10), 100);
        assert_eq!(confidence_score(42), 100);
        assert_eq!(confidence_score(u32::MAX), 100);
    }

    #[test]
    fn test_merge_togaf_pair() {
        let a = question("p1_q001", 1, "What is the purpose of TOGAF ADM?", Some(3));
        let b = question("p2_q007", 7, "what is the purpose of togaf adm", Some(2));

        let merged = merge_group(&[&a, &b]).unwrap();
        assert_eq!(merged.frequency, Some(5));
        assert_eq!(merged.duplicate_count, Some(2));
        assert_eq!(merged.confidence_score, Some(50));
        assert_eq!(merged.id, "p1_q001");
        assert_eq!(merged.text, a.text);
    }

    #[test]
    fn test_merge_defaults_missing_frequency_to_one() {
        let a = question("a", 1, "x", None);
        let b = question("b", 2, "x", None);
        let c = question("c", 3, "x", Some(4));

        let merged = merge_group(&[&a, &b, &c]).unwrap();
        assert_eq!(merged.frequency, Some(6));
        assert_eq!(merged.duplicate_count, Some(3));
        assert_eq!(merged.confidence_score, Some(60));
        assert_eq!(merged.id, "c");
    }

    #[test]
    fn test_merge_base_tie_prefers_first() {
        let mut a = question("a", 1, "first text", Some(2));
        a.image = Some("a.png".to_string());
        let b = question("b", 2, "second text", Some(2));

        let merged = merge_group(&[&a, &b]).unwrap();
        assert_eq!(merged.id, "a");
        assert_eq!(merged.image.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_merge_single_and_empty() {
        let a = question("a", 1, "x", None);
        let same = merge_group(&[&a]).unwrap();
        assert_eq!(same, a);
        assert!(same.duplicate_count.is_none());
        assert!(same.confidence_score.is_none());
        assert!(merge_group(&[]).is_none());
    }

    #[test]
    fn test_sort_by_frequency_then_number() {
        let mut records = vec![
            question("a", 3, "a", None),
            question("b", 1, "b", Some(2)),
            question("c", 2, "c", None),
            question("d", 4, "d", Some(5)),
            question("e", 0, "e", Some(1)),
        ];
        sort_by_frequency(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "e", "c", "a"]);
    }

    #[test]
    fn test_dedupe_records_with_shared_ids() {
        // Same id in two files, different questions
        let mut a = question("q001", 1, "Which phase defines the baseline?", Some(2));
        a.source_file = Some("part1.json".to_string());
        let mut b = question("q001", 1, "Who approves the Statement of Architecture Work?", None);
        b.source_file = Some("part2.json".to_string());
        let mut c = question("q002", 2, "Which phase defines the baseline", Some(1));
        c.source_file = Some("part2.json".to_string());

        let (records, groups) = dedupe_records(vec![a, b, c], &GroupOptions::default());
        assert_eq!(groups, 1);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].frequency, Some(3));
        assert_eq!(records[0].duplicate_count, Some(2));
        assert_eq!(records[0].source_file.as_deref(), Some("part1.json"));

        assert_eq!(records[1].text, "Who approves the Statement of Architecture Work?");
        assert!(records[1].duplicate_count.is_none());
    }

    #[test]
    fn test_dedupe_invariants_hold_for_every_group() {
        let records = vec![
            question("1", 1, "Define architecture governance", Some(2)),
            question("2", 2, "Define architecture governance.", Some(7)),
            question("3", 3, "define ARCHITECTURE governance!", None),
            question("4", 4, "List the ADM phases", Some(1)),
            question("5", 5, "List the ADM phases?", Some(1)),
            question("6", 6, "Describe the Enterprise Continuum", None),
        ];
        let (out, groups) = dedupe_records(records, &GroupOptions::default());
        assert_eq!(groups, 2);
        assert_eq!(out.len(), 3);

        let governance = out.iter().find(|r| r.id == "2").unwrap();
        assert_eq!(governance.frequency, Some(10));
        assert_eq!(governance.duplicate_count, Some(3));
        assert_eq!(governance.confidence_score, Some(100));

        let phases = out.iter().find(|r| r.id == "4").unwrap();
        assert_eq!(phases.frequency, Some(2));
        assert_eq!(phases.duplicate_count, Some(2));
        assert_eq!(phases.confidence_score, Some(20));

        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4", "6"]);
    }

    #[test]
    fn test_dedupe_transitive_option() {
        let records = vec![
            question("b", 1, "abcdefghxy", None),
            question("c", 2, "xycdefghij", None),
            question("a", 3, "abcdefghij", None),
        ];
        let options = GroupOptions {
            threshold: Threshold::new(0.8).unwrap(),
            strategy: Strategy::Transitive,
        };
        let (out, groups) = dedupe_records(records, &options);
        assert_eq!(groups, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].frequency, Some(3));
    }

    #[test]
    fn test_merge_files_requires_sources() {
        assert_eq!(
            merge_files(&[], &GroupOptions::default()).unwrap_err(),
            UsageError::NoSources
        );
    }

    proptest! {
        #[test]
        fn test_merge_group_sums_any_frequencies(
            freqs in prop::collection::vec(prop::option::of(any::<u32>()), 2..10)
        ) {
            let records: Vec<QuestionRecord> = freqs
                .iter()
                .enumerate()
                .map(|(i, f)| question(&format!("q{}", i), i as u32 + 1, "same text", *f))
                .collect();
            let refs: Vec<&QuestionRecord> = records.iter().collect();

            let merged = merge_group(&refs).unwrap();

            let effective: Vec<u32> = freqs.iter().map(|f| f.unwrap_or(1)).collect();
            let total = effective.iter().fold(0u32, |acc, f| acc.saturating_add(*f));
            let max = *effective.iter().max().unwrap();
            let base = effective.iter().position(|f| *f == max).unwrap();

            prop_assert_eq!(merged.frequency, Some(total));
            prop_assert_eq!(merged.confidence_score, Some(total.saturating_mul(10).min(100)));
            prop_assert_eq!(merged.duplicate_count, Some(freqs.len()));
            prop_assert_eq!(&merged.id, &records[base].id);
        }

        #[test]
        fn test_merge_group_small_frequencies(
            freqs in prop::collection::vec(prop::option::of(0u32..20), 2..10)
        ) {
            let records: Vec<QuestionRecord> = freqs
                .iter()
                .enumerate()
                .map(|(i, f)| question(&format!("q{}", i), i as u32 + 1, "same text", *f))
                .collect();
            let refs: Vec<&QuestionRecord> = records.iter().collect();

            let merged = merge_group(&refs).unwrap();
            let total: u32 = freqs.iter().map(|f| f.unwrap_or(1)).sum();

            prop_assert_eq!(merged.frequency, Some(total));
            prop_assert_eq!(merged.confidence_score, Some((total * 10).min(100)));
            prop_assert_eq!(merged.duplicate_count, Some(freqs.len()));
        }
    }
}
