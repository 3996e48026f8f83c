use crate::dataset::QuestionRecord;
use crate::error::UsageError;
use crate::normalize::normalize;
use crate::similarity::ratio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Minimum similarity for two questions to count as duplicates, in (0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, UsageError> {
        if value > 0.0 && value <= 1.0 {
            Ok(Threshold(value))
        } else {
            Err(UsageError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(DEFAULT_THRESHOLD)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * 100.0).round() as u32)
    }
}

/// How records are clustered once pairwise similarity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Each group is seeded by its first record; later records join when
    /// similar enough to that anchor. Members are not compared to each other.
    #[default]
    Anchor,
    /// Connected components of the "similar enough" graph.
    Transitive,
}

impl FromStr for Strategy {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anchor" => Ok(Strategy::Anchor),
            "transitive" => Ok(Strategy::Transitive),
            _ => Err(UsageError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Anchor => write!(f, "anchor"),
            Strategy::Transitive => write!(f, "transitive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupOptions {
    pub threshold: Threshold,
    pub strategy: Strategy,
}

/// Partition `records` into similarity groups, as index lists.
///
/// Every index appears in exactly one group. Groups are ordered by their
/// first member and members keep input order; unique records come back as
/// groups of one.
pub fn find_groups(records: &[QuestionRecord], options: &GroupOptions) -> Vec<Vec<usize>> {
    let start = Instant::now();
    let texts: Vec<String> = records.iter().map(|r| normalize(&r.text)).collect();
    let threshold = options.threshold.value();

    let groups = match options.strategy {
        Strategy::Anchor => anchor_groups(&texts, threshold),
        Strategy::Transitive => transitive_groups(&texts, threshold),
    };

    debug!(
        records = records.len(),
        groups = groups.len(),
        duplicate_groups = groups.iter().filter(|g| g.len() > 1).count(),
        strategy = %options.strategy,
        elapsed = ?start.elapsed(),
        "grouped records"
    );

    groups
}

/// Same as [`find_groups`], returning the records themselves.
pub fn group<'a>(
    records: &'a [QuestionRecord],
    options: &GroupOptions,
) -> Vec<Vec<&'a QuestionRecord>> {
    find_groups(records, options)
        .into_iter()
        .map(|g| g.into_iter().map(|i| &records[i]).collect())
        .collect()
}

/// Whether two normalized texts reach `threshold`.
fn is_similar(a: &str, b: &str, threshold: f64) -> bool {
    // The matched length can never exceed the shorter string, so the ratio is
    // bounded by 2 * min / (len_a + len_b). Skip the alignment when even that
    // bound falls short.
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la + lb > 0 {
        let bound = 2.0 * la.min(lb) as f64 / (la + lb) as f64;
        if bound < threshold {
            return false;
        }
    }
    ratio(a, b) >= threshold
}

fn anchor_groups(texts: &[String], threshold: f64) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; texts.len()];
    let mut groups = Vec::new();

    for anchor in 0..texts.len() {
        if assigned[anchor] {
            continue;
        }
        assigned[anchor] = true;
        let mut members = vec![anchor];

        for candidate in (anchor + 1)..texts.len() {
            if assigned[candidate] {
                continue;
            }
            if is_similar(&texts[anchor], &texts[candidate], threshold) {
                members.push(candidate);
                assigned[candidate] = true;
            }
        }

        groups.push(members);
    }

    groups
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller index as root so components stay anchored on
            // their earliest record.
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}

fn transitive_groups(texts: &[String], threshold: f64) -> Vec<Vec<usize>> {
    let n = texts.len();
    let mut sets = UnionFind::new(n);

    for i in 0..n {
        for j in (i + 1)..n {
            if sets.find(i) == sets.find(j) {
                continue;
            }
            if is_similar(&texts[i], &texts[j], threshold) {
                sets.union(i, j);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let root = sets.find(i);
        match slot_of_root[root] {
            Some(slot) => groups[slot].push(i),
            None => {
                slot_of_root[root] = Some(groups.len());
                groups.push(vec![i]);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(texts: &[&str]) -> Vec<QuestionRecord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| QuestionRecord::new(format!("q{}", i + 1), i as u32 + 1, *t))
            .collect()
    }

    fn options(threshold: f64, strategy: Strategy) -> GroupOptions {
        GroupOptions {
            threshold: Threshold::new(threshold).unwrap(),
            strategy,
        }
    }

    fn assert_partition(groups: &[Vec<usize>], n: usize) {
        let mut seen: Vec<usize> = groups.iter().flatten().copied().collect();
        seen.sort();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
        assert!(groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.85).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(Threshold::new(0.0001).is_ok());
        assert_eq!(Threshold::new(0.0), Err(UsageError::InvalidThreshold(0.0)));
        assert!(Threshold::new(1.01).is_err());
        assert!(Threshold::new(-0.5).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::default().value(), 0.85);
        assert_eq!(Threshold::default().to_string(), "85%");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("anchor".parse::<Strategy>(), Ok(Strategy::Anchor));
        assert_eq!("Transitive".parse::<Strategy>(), Ok(Strategy::Transitive));
        assert_eq!(
            "cluster".parse::<Strategy>(),
            Err(UsageError::UnknownStrategy("cluster".to_string()))
        );
    }

    #[test]
    fn test_groups_case_and_punctuation_variants() {
        let recs = records(&[
            "What is the purpose of TOGAF ADM?",
            "Which phase produces the Architecture Vision?",
            "what is the purpose of togaf adm",
        ]);
        let groups = find_groups(&recs, &GroupOptions::default());
        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_partition_covers_every_record() {
        let recs = records(&[
            "alpha question one",
            "alpha question one!",
            "beta question two",
            "gamma question three",
            "Beta question two",
            "alpha question one?",
        ]);
        for strategy in [Strategy::Anchor, Strategy::Transitive] {
            let groups = find_groups(&recs, &options(0.85, strategy));
            assert_partition(&groups, recs.len());
            assert_eq!(groups, vec![vec![0, 1, 5], vec![2, 4], vec![3]]);
        }
    }

    #[test]
    fn test_anchor_groups_are_stars() {
        // a~b and a~c reach 0.8, b~c only 0.6
        let recs = records(&["abcdefghij", "abcdefghxy", "xycdefghij"]);
        let groups = find_groups(&recs, &options(0.8, Strategy::Anchor));
        assert_eq!(groups, vec![vec![0, 1, 2]]);
        assert!(ratio("abcdefghxy", "xycdefghij") < 0.8);
    }

    #[test]
    fn test_anchor_depends_on_order_transitive_does_not() {
        let recs = records(&["abcdefghxy", "xycdefghij", "abcdefghij"]);

        let anchor = find_groups(&recs, &options(0.8, Strategy::Anchor));
        assert_eq!(anchor, vec![vec![0, 2], vec![1]]);

        let transitive = find_groups(&recs, &options(0.8, Strategy::Transitive));
        assert_eq!(transitive, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_threshold_one_requires_identical_normalized_text() {
        let recs = records(&["Define a gap.", "define a gap", "Define a gaps"]);
        let groups = find_groups(&recs, &options(1.0, Strategy::Anchor));
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_low_threshold_groups_almost_everything() {
        let recs = records(&["alpha", "beta", "gamma", "delta"]);
        let groups = find_groups(&recs, &options(0.01, Strategy::Anchor));
        assert_eq!(groups, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_empty_and_single_input() {
        assert!(find_groups(&[], &GroupOptions::default()).is_empty());
        let one = records(&["only question"]);
        assert_eq!(find_groups(&one, &GroupOptions::default()), vec![vec![0]]);
    }

    #[test]
    fn test_group_returns_records() {
        let recs = records(&["Same text", "same text!", "Other"]);
        let groups = group(&recs, &GroupOptions::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][0].id, "q1");
        assert_eq!(groups[0][1].id, "q2");
        assert_eq!(groups[1][0].id, "q3");
    }

    #[test]
    fn test_length_bound_matches_full_ratio() {
        // The bound only skips pairs the full ratio would also reject
        let pairs = [("abc", "abcdefghijkl"), ("short", "short but longer text"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(is_similar(a, b, 0.85), ratio(a, b) >= 0.85);
        }
        assert!(is_similar("", "", 1.0));
    }
}
