//! Medication lookup by name.
//!
//! Handles bedside shorthand ("epi", "bicarb") through an alias table, then
//! ranks candidates by exact, prefix, substring and fuzzy name similarity.

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::MedicationRule;

/// Minimum fuzzy score for a candidate to be returned.
const FUZZY_THRESHOLD: f64 = 0.75;

/// A medication matching a search query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationMatch {
    pub id: String,
    pub name: String,
    /// Similarity in [0, 1]; 1.0 is an exact match
    pub score: f64,
}

/// Common spoken or written shorthand: alias → canonical medication id.
const ALIASES: &[(&str, &str)] = &[
    ("epi", "epinephrine"),
    ("adrenaline", "epinephrine"),
    ("amio", "amiodarone"),
    ("bicarb", "sodium-bicarbonate"),
    ("d10", "dextrose"),
    ("d25", "dextrose"),
    ("glucose", "dextrose"),
    ("calcium", "calcium-chloride"),
    ("versed", "midazolam"),
    ("ativan", "lorazepam"),
    ("narcan", "naloxone"),
    ("roc", "rocuronium"),
    ("sux", "succinylcholine"),
];

/// Search medications by name, id or alias, best matches first.
pub fn search_medications(
    rules: &[MedicationRule],
    query: &str,
    limit: usize,
) -> Vec<MedicationMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let aliased = ALIASES
        .iter()
        .find(|(alias, _)| *alias == query)
        .map(|(_, id)| *id);

    let mut matches: Vec<MedicationMatch> = rules
        .iter()
        .filter_map(|rule| {
            let score = if aliased == Some(rule.id.as_str()) {
                1.0
            } else {
                score_name(&query, &rule.name.to_lowercase(), &rule.id)
            };
            (score >= FUZZY_THRESHOLD).then(|| MedicationMatch {
                id: rule.id.clone(),
                name: rule.name.clone(),
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    matches.truncate(limit);
    matches
}

fn score_name(query: &str, name: &str, id: &str) -> f64 {
    if name == query || id == query {
        1.0
    } else if name.starts_with(query) || id.starts_with(query) {
        0.95
    } else if name.contains(query) {
        0.9
    } else {
        fuzzy_match(query, name)
    }
}

/// Jaro-Winkler favours shared prefixes (typos); Levenshtein overall edits.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}
