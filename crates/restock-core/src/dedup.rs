//! Duplicate detection for incoming batches.
//!
//! Two composable strategies: exact-key matching against a hash set (always
//! on, O(n)), and opt-in fuzzy title matching against the existing catalog
//! (O(n·m), normalized Levenshtein similarity). Every duplicate is
//! attributed to its first occurrence — the earlier batch item or the
//! pre-existing catalog entry — and the original is never mutated.

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::RawInputRecord;
use crate::identifier::Identifier;

/// Detector tunables. Fuzzy matching is off by default; 0.85 is the
/// documented default threshold when it is enabled.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub fuzzy_enabled: bool,
    pub fuzzy_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: false,
            fuzzy_threshold: 0.85,
        }
    }
}

/// How a duplicate was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

/// A batch item that normalized to a canonical identifier.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub identifier: Identifier,
    pub record: RawInputRecord,
}

/// A rejected batch item with its attribution.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    pub identifier: Identifier,
    /// The first-seen batch identifier or catalog identifier it collided with.
    pub matched_identifier: Identifier,
    pub kind: MatchKind,
    /// Similarity score for fuzzy matches; `None` for exact matches.
    pub similarity: Option<f64>,
}

/// Result of partitioning a batch: `unique.len() + duplicates.len()` always
/// equals the input length.
#[derive(Debug)]
pub struct BatchPartition {
    pub unique: Vec<NormalizedInput>,
    pub duplicates: Vec<DuplicateMatch>,
}

/// Partitions a normalized batch into unique items and duplicates.
///
/// `existing_keys` are catalog identifiers the caller wants treated as
/// already-seen (supplied when re-imports should be skipped rather than
/// updated). `existing_titles` is consulted only when fuzzy matching is
/// enabled and the item carries a title.
#[must_use]
pub fn partition(
    items: Vec<NormalizedInput>,
    existing_keys: &HashSet<Identifier>,
    existing_titles: &[(Identifier, String)],
    config: &DedupConfig,
) -> BatchPartition {
    let mut unique: Vec<NormalizedInput> = Vec::with_capacity(items.len());
    let mut duplicates: Vec<DuplicateMatch> = Vec::new();
    let mut seen: HashSet<Identifier> = HashSet::with_capacity(items.len());

    for item in items {
        if existing_keys.contains(&item.identifier) {
            duplicates.push(DuplicateMatch {
                matched_identifier: item.identifier.clone(),
                identifier: item.identifier,
                kind: MatchKind::Exact,
                similarity: None,
            });
            continue;
        }

        if !seen.insert(item.identifier.clone()) {
            duplicates.push(DuplicateMatch {
                matched_identifier: item.identifier.clone(),
                identifier: item.identifier,
                kind: MatchKind::Exact,
                similarity: None,
            });
            continue;
        }

        if config.fuzzy_enabled {
            if let Some(hit) = fuzzy_match(
                item.record.title.as_deref(),
                existing_titles,
                config.fuzzy_threshold,
            ) {
                duplicates.push(DuplicateMatch {
                    identifier: item.identifier,
                    matched_identifier: hit.0,
                    kind: MatchKind::Fuzzy,
                    similarity: Some(hit.1),
                });
                continue;
            }
        }

        unique.push(item);
    }

    BatchPartition { unique, duplicates }
}

/// Finds the best catalog title match at or above `threshold`, if any.
/// Ties keep the earlier catalog entry.
fn fuzzy_match(
    title: Option<&str>,
    existing_titles: &[(Identifier, String)],
    threshold: f64,
) -> Option<(Identifier, f64)> {
    let title = normalize_title(title?);
    if title.is_empty() {
        return None;
    }
    let title_len = title.chars().count();

    let mut best: Option<(Identifier, f64)> = None;
    for (id, candidate) in existing_titles {
        let candidate = normalize_title(candidate);
        if candidate.is_empty() {
            continue;
        }

        let candidate_len = candidate.chars().count();
        let max_len = title_len.max(candidate_len);

        // Length pre-filter: a pair whose lengths differ by more than
        // (1 - threshold) of the longer string cannot reach the threshold.
        let len_diff = title_len.abs_diff(candidate_len);
        #[allow(clippy::cast_precision_loss)]
        if (len_diff as f64) / (max_len as f64) > 1.0 - threshold {
            continue;
        }

        let distance = strsim::levenshtein(&title, &candidate);
        #[allow(clippy::cast_precision_loss)]
        let similarity = 1.0 - (distance as f64 / max_len as f64);

        if similarity >= threshold && best.as_ref().is_none_or(|(_, s)| similarity > *s) {
            best = Some((id.clone(), similarity));
        }
    }
    best
}

/// Lowercases, strips punctuation, and collapses whitespace.
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> NormalizedInput {
        NormalizedInput {
            identifier: Identifier::parse(id).expect("test identifier"),
            record: RawInputRecord::from_reference(id),
        }
    }

    fn item_with_title(id: &str, title: &str) -> NormalizedInput {
        let mut input = item(id);
        input.record.title = Some(title.to_owned());
        input
    }

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).expect("test identifier")
    }

    #[test]
    fn empty_batch_partitions_to_empty() {
        let result = partition(vec![], &HashSet::new(), &[], &DedupConfig::default());
        assert!(result.unique.is_empty());
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn distinct_identifiers_are_all_unique() {
        let result = partition(
            vec![item("B000000001"), item("B000000002")],
            &HashSet::new(),
            &[],
            &DedupConfig::default(),
        );
        assert_eq!(result.unique.len(), 2);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn within_batch_repeat_is_exact_duplicate() {
        let result = partition(
            vec![item("B000000001"), item("B000000001")],
            &HashSet::new(),
            &[],
            &DedupConfig::default(),
        );
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.duplicates.len(), 1);
        let dup = &result.duplicates[0];
        assert_eq!(dup.kind, MatchKind::Exact);
        assert_eq!(dup.matched_identifier, id("B000000001"));
        assert!(dup.similarity.is_none());
    }

    #[test]
    fn catalog_key_is_exact_duplicate() {
        let existing: HashSet<Identifier> = [id("B000000001")].into_iter().collect();
        let result = partition(
            vec![item("B000000001"), item("B000000002")],
            &existing,
            &[],
            &DedupConfig::default(),
        );
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.unique[0].identifier, id("B000000002"));
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].kind, MatchKind::Exact);
    }

    #[test]
    fn partition_is_exhaustive() {
        let batch = vec![
            item("B000000001"),
            item("B000000002"),
            item("B000000001"),
            item("B000000003"),
        ];
        let total = batch.len();
        let result = partition(batch, &HashSet::new(), &[], &DedupConfig::default());
        assert_eq!(result.unique.len() + result.duplicates.len(), total);
    }

    #[test]
    fn same_product_by_url_and_asin_dedups_to_one() {
        // "B000000000" and "http://x/dp/B000000000" normalize to the same key.
        let a = Identifier::parse("B000000000").unwrap();
        let b = Identifier::parse("http://x/dp/B000000000").unwrap();
        assert_eq!(a, b);
        let batch = vec![
            NormalizedInput {
                identifier: a,
                record: RawInputRecord::from_reference("B000000000"),
            },
            NormalizedInput {
                identifier: b,
                record: RawInputRecord::from_reference("http://x/dp/B000000000"),
            },
        ];
        let result = partition(batch, &HashSet::new(), &[], &DedupConfig::default());
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].kind, MatchKind::Exact);
    }

    #[test]
    fn fuzzy_disabled_ignores_similar_titles() {
        let titles = vec![(id("B000000009"), "Wireless Charger 2-Pack".to_owned())];
        let result = partition(
            vec![item_with_title("B000000001", "Wireless Charger 2 Pack")],
            &HashSet::new(),
            &titles,
            &DedupConfig::default(),
        );
        assert_eq!(result.unique.len(), 1);
    }

    #[test]
    fn fuzzy_match_flags_near_identical_title() {
        let titles = vec![(id("B000000009"), "Wireless Charger 2-Pack".to_owned())];
        let config = DedupConfig {
            fuzzy_enabled: true,
            ..DedupConfig::default()
        };
        let result = partition(
            vec![item_with_title("B000000001", "wireless charger 2 pack!")],
            &HashSet::new(),
            &titles,
            &config,
        );
        assert!(result.unique.is_empty());
        let dup = &result.duplicates[0];
        assert_eq!(dup.kind, MatchKind::Fuzzy);
        assert_eq!(dup.matched_identifier, id("B000000009"));
        let similarity = dup.similarity.expect("fuzzy match carries similarity");
        assert!(similarity >= 0.85, "similarity was {similarity}");
    }

    #[test]
    fn fuzzy_match_respects_threshold() {
        let titles = vec![(id("B000000009"), "Wireless Charger 2-Pack".to_owned())];
        let config = DedupConfig {
            fuzzy_enabled: true,
            ..DedupConfig::default()
        };
        let result = partition(
            vec![item_with_title("B000000001", "USB-C Cable 6ft Braided")],
            &HashSet::new(),
            &titles,
            &config,
        );
        assert_eq!(result.unique.len(), 1);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn fuzzy_without_title_never_matches() {
        let titles = vec![(id("B000000009"), "Wireless Charger 2-Pack".to_owned())];
        let config = DedupConfig {
            fuzzy_enabled: true,
            ..DedupConfig::default()
        };
        let result = partition(vec![item("B000000001")], &HashSet::new(), &titles, &config);
        assert_eq!(result.unique.len(), 1);
    }

    #[test]
    fn normalize_title_strips_punctuation_and_case() {
        assert_eq!(
            normalize_title("  Wireless-Charger, (2 Pack)!  "),
            "wireless charger 2 pack"
        );
    }

    #[test]
    fn normalize_title_empty_for_punctuation_only() {
        assert_eq!(normalize_title("-- !! --"), "");
    }
}
