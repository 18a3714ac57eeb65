//! Canonical identity resolution.
//!
//! Partitions a record set into clusters of records judged to describe the
//! same real-world event. Matching is two-tier:
//!
//! 1. exact key match on the configured key (trimmed `original_url` by default)
//! 2. fuzzy match: title token Jaccard similarity at or above the threshold
//!    *and* equal normalized locations
//!
//! Clusters are the transitive closure of the pairwise relation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::EventRecord;
use crate::normalize::{jaccard, normalize_location, normalize_title, title_tokens};

/// Default Jaccard cutoff for fuzzy matches.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.80;

/// Which field the exact-match tier compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeKey {
    #[default]
    OriginalUrl,
    /// Lower-precision legacy mode
    NormalizedTitle,
}

impl DedupeKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OriginalUrl => "original_url",
            Self::NormalizedTitle => "normalized_title",
        }
    }

    fn key_of(self, record: &EventRecord) -> String {
        match self {
            Self::OriginalUrl => record.url_key().to_string(),
            Self::NormalizedTitle => {
                if record.normalized_title.is_empty() {
                    normalize_title(&record.title)
                } else {
                    record.normalized_title.clone()
                }
            }
        }
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "original_url" => Ok(Self::OriginalUrl),
            "normalized_title" => Ok(Self::NormalizedTitle),
            other => Err(format!("unknown dedupe key '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    pub key: DedupeKey,
    /// Whether the fuzzy tier runs at all
    pub fuzzy: bool,
    pub fuzzy_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            key: DedupeKey::OriginalUrl,
            fuzzy: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl ResolverConfig {
    /// Exact-key matching only
    #[must_use]
    pub const fn exact_only(mut self) -> Self {
        self.fuzzy = false;
        self
    }

    #[must_use]
    pub const fn with_key(mut self, key: DedupeKey) -> Self {
        self.key = key;
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    config: ResolverConfig,
}

impl IdentityResolver {
    pub const fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Pairwise judgement: do `left` and `right` describe the same event?
    pub fn is_same_event(&self, left: &EventRecord, right: &EventRecord) -> bool {
        let left_key = self.config.key.key_of(left);
        if !left_key.is_empty() && left_key == self.config.key.key_of(right) {
            return true;
        }
        self.config.fuzzy
            && normalize_location(&left.location) == normalize_location(&right.location)
            && jaccard(&title_tokens(&left.title), &title_tokens(&right.title))
                >= self.config.fuzzy_threshold
    }

    /// Partition `records` into clusters.
    ///
    /// Clusters come back in order of their first member's position in the
    /// input, and members keep their input order.
    pub fn cluster(&self, records: Vec<EventRecord>) -> Vec<Vec<EventRecord>> {
        let groups = self.cluster_indices(&records);

        let mut slots: Vec<Option<EventRecord>> = records.into_iter().map(Some).collect();
        groups
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .filter_map(|index| slots[index].take())
                    .collect()
            })
            .collect()
    }

    /// Same partition as [`Self::cluster`], expressed as input indices.
    pub fn cluster_indices(&self, records: &[EventRecord]) -> Vec<Vec<usize>> {
        let mut sets = DisjointSet::new(records.len());

        self.union_exact(records, &mut sets);
        if self.config.fuzzy {
            self.union_fuzzy(records, &mut sets);
        }

        let mut order: Vec<usize> = Vec::new();
        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        for index in 0..records.len() {
            let root = sets.find(index);
            members
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(index);
        }

        order
            .into_iter()
            .filter_map(|root| members.remove(&root))
            .collect()
    }

    fn union_exact(&self, records: &[EventRecord], sets: &mut DisjointSet) {
        let mut first_by_key: HashMap<String, usize> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            let key = self.config.key.key_of(record);
            if key.is_empty() {
                continue;
            }
            match first_by_key.get(&key) {
                Some(&first) => sets.union(first, index),
                None => {
                    first_by_key.insert(key, index);
                }
            }
        }
    }

    // Location equality is required, so only records sharing a normalized
    // location are compared pairwise.
    fn union_fuzzy(&self, records: &[EventRecord], sets: &mut DisjointSet) {
        let mut by_location: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            by_location
                .entry(normalize_location(&record.location))
                .or_default()
                .push(index);
        }

        for indices in by_location.values().filter(|indices| indices.len() > 1) {
            let tokens: Vec<HashSet<String>> = indices
                .iter()
                .map(|&index| title_tokens(&records[index].title))
                .collect();

            for (a, &left) in indices.iter().enumerate() {
                for (b, &right) in indices.iter().enumerate().skip(a + 1) {
                    if sets.find(left) == sets.find(right) {
                        continue;
                    }
                    if jaccard(&tokens[a], &tokens[b]) >= self.config.fuzzy_threshold {
                        sets.union(left, right);
                    }
                }
            }
        }
    }
}

/// Union-find with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    fn union(&mut self, left: usize, right: usize) {
        let (mut left, mut right) = (self.find(left), self.find(right));
        if left == right {
            return;
        }
        if self.size[left] < self.size[right] {
            std::mem::swap(&mut left, &mut right);
        }
        self.parent[right] = left;
        self.size[left] += self.size[right];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::event;

    fn ids(clusters: &[Vec<EventRecord>]) -> Vec<Vec<i64>> {
        clusters
            .iter()
            .map(|cluster| cluster.iter().map(|record| record.id.get()).collect())
            .collect()
    }

    #[test]
    fn exact_url_match_ignores_surrounding_whitespace() {
        let resolver = IdentityResolver::default();
        let a = event(1, "Jazz Night", "https://x.test/e1", 0);
        let b = event(2, "Totally different", " https://x.test/e1 ", 0);
        assert!(resolver.is_same_event(&a, &b));
    }

    #[test]
    fn fuzzy_match_requires_similar_title_and_same_location() {
        let resolver = IdentityResolver::default();
        let a = event(1, "SF Jazz Festival Night", "https://x.test/a", 0);
        let b = event(2, "Jazz Festival Night SF", "https://x.test/b", 0);
        assert!(resolver.is_same_event(&a, &b));

        let mut elsewhere = b.clone();
        elsewhere.location = "Golden Gate Park".to_string();
        assert!(!resolver.is_same_event(&a, &elsewhere));
    }

    #[test]
    fn fuzzy_below_threshold_is_distinct() {
        let resolver = IdentityResolver::default();
        let a = event(1, "Jazz Festival", "https://x.test/a", 0);
        let b = event(2, "Jazz Workshop", "https://x.test/b", 0);
        assert!(!resolver.is_same_event(&a, &b));
    }

    #[test]
    fn exact_only_skips_fuzzy_tier() {
        let resolver = IdentityResolver::new(ResolverConfig::default().exact_only());
        let a = event(1, "SF Jazz Festival Night", "https://x.test/a", 0);
        let b = event(2, "Jazz Festival Night SF", "https://x.test/b", 0);
        assert!(!resolver.is_same_event(&a, &b));
    }

    #[test]
    fn cluster_is_transitive() {
        // a~b by url, b~c by fuzzy title + location
        let resolver = IdentityResolver::default();
        let a = event(1, "Opening Party", "https://x.test/shared", 0);
        let b = event(2, "Gallery Opening Night Party", "https://x.test/shared", 0);
        let c = event(3, "Party Night Opening Gallery", "https://x.test/other", 0);
        let d = event(4, "Unrelated Lecture", "https://x.test/d", 0);

        let clusters = resolver.cluster(vec![a, b, c, d]);
        assert_eq!(ids(&clusters), vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn singletons_stay_alone() {
        let resolver = IdentityResolver::default();
        let clusters = resolver.cluster(vec![
            event(1, "Alpha", "https://x.test/1", 0),
            event(2, "Beta", "https://x.test/2", 0),
        ]);
        assert_eq!(ids(&clusters), vec![vec![1], vec![2]]);
    }

    #[test]
    fn empty_keys_never_match() {
        let resolver = IdentityResolver::new(ResolverConfig::default().exact_only());
        let clusters = resolver.cluster(vec![
            event(1, "Alpha", "  ", 0),
            event(2, "Beta", "", 0),
        ]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn normalized_title_key_groups_by_title() {
        let resolver = IdentityResolver::new(
            ResolverConfig::default()
                .exact_only()
                .with_key(DedupeKey::NormalizedTitle),
        );
        let mut a = event(1, "Jazz Night", "https://x.test/1", 0);
        let mut b = event(2, "JAZZ   night", "https://x.test/2", 0);
        a.location = "Venue A".to_string();
        b.location = "Venue B".to_string();

        let clusters = resolver.cluster(vec![a, b]);
        assert_eq!(ids(&clusters), vec![vec![1, 2]]);
    }

    #[test]
    fn dedupe_key_parses_cli_spellings() {
        assert_eq!("original-url".parse::<DedupeKey>(), Ok(DedupeKey::OriginalUrl));
        assert_eq!(
            "normalized_title".parse::<DedupeKey>(),
            Ok(DedupeKey::NormalizedTitle)
        );
        assert!("url".parse::<DedupeKey>().is_err());
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = IdentityResolver::new(ResolverConfig::default().with_threshold(1.0));
        let a = event(1, "Jazz Festival Night", "https://x.test/a", 0);
        let b = event(2, "Jazz Festival Night SF", "https://x.test/b", 0);
        assert!(!strict.is_same_event(&a, &b));

        let loose = IdentityResolver::new(ResolverConfig::default().with_threshold(0.7));
        assert!(loose.is_same_event(&a, &b));
    }
}
