//! Naive term-overlap relevance for context records.
//!
//! Score = 1.0 per distinct query term found in the record
//!       + 2.0 per distinct location term found in the record.
//! A term present in both query and location counts once, as a location term.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::knowledge::record::ContextRecord;

pub const QUERY_TERM_WEIGHT: f64 = 1.0;
pub const LOCATION_TERM_WEIGHT: f64 = 2.0;
pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

const MIN_TERM_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "how", "when", "where",
    "why", "with", "from", "that", "this", "these", "those", "there", "their", "about", "into",
    "near", "does", "can", "could", "should", "would", "will", "have", "has", "had", "any",
    "all", "you", "your", "our", "its", "not", "but", "doing", "tell", "please", "latest",
    "current", "now", "today",
];

/// A record that matched a search, with its score and rendered snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub source: String,
    pub line: usize,
    pub score: f64,
    pub snippet: String,
}

/// Lower-cased alphanumeric tokens, stop words and short tokens removed,
/// trailing plural `s` stripped from tokens longer than 4 characters
/// (but not from `-ss` endings, so "press" and "access" stay whole).
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .map(|t| normalize(&t))
        .collect()
}

fn normalize(token: &str) -> String {
    if token.chars().count() > 4 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Scores one record against pre-tokenized query and location terms.
pub fn score_record(
    record_terms: &HashSet<String>,
    query_terms: &HashSet<String>,
    location_terms: &HashSet<String>,
) -> f64 {
    let location_hits = location_terms
        .iter()
        .filter(|t| record_terms.contains(*t))
        .count();
    let query_hits = query_terms
        .iter()
        .filter(|t| !location_terms.contains(*t) && record_terms.contains(*t))
        .count();
    query_hits as f64 * QUERY_TERM_WEIGHT + location_hits as f64 * LOCATION_TERM_WEIGHT
}

/// Ranks `records` against the query/location and returns the top `limit` matches.
/// Records with no overlapping term are never returned.
pub fn rank(
    records: &[ContextRecord],
    query: &str,
    location: Option<&str>,
    limit: usize,
) -> Vec<KnowledgeMatch> {
    let query_terms = tokenize(query);
    let location_terms = location.map(tokenize).unwrap_or_default();

    if query_terms.is_empty() && location_terms.is_empty() {
        return vec![];
    }

    let mut scored: Vec<(f64, &ContextRecord)> = records
        .iter()
        .filter_map(|record| {
            let record_terms = tokenize(&record.leaf_text().join(" "));
            let score = score_record(&record_terms, &query_terms, &location_terms);
            (score > 0.0).then_some((score, record))
        })
        .collect();

    scored.sort_by(|(sa, ra), (sb, rb)| {
        sb.total_cmp(sa)
            .then_with(|| ra.source.cmp(&rb.source))
            .then_with(|| ra.line.cmp(&rb.line))
    });

    scored
        .into_iter()
        .take(limit.clamp(1, MAX_LIMIT))
        .map(|(score, record)| KnowledgeMatch {
            source: record.source.clone(),
            line: record.line,
            score,
            snippet: record.snippet(),
        })
        .collect()
}
