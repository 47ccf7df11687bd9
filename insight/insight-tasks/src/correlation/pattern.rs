//! Collapse index names into wildcard patterns.
//!
//! A name whose tail is a run of numeric segments (`000001`, `2025-12-19`,
//! `2025.12.19`) collapses to its prefix plus `*`, provided the prefix contains
//! a letter. Everything else is its own pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ROLLOVER_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<prefix>.*?[-_.])(?P<tail>\d+(?:[-_.]\d+)*)$").unwrap());

/// Prefix marking system-reserved indices
pub const SYSTEM_INDEX_PREFIX: char = '.';

/// A wildcard pattern and the indices it covers, in scan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPattern {
    pub pattern: String,
    pub indices: Vec<String>,
}

pub fn is_system_index(name: &str) -> bool {
    name.starts_with(SYSTEM_INDEX_PREFIX)
}

/// Pattern an index name belongs to
pub fn pattern_for(index: &str) -> String {
    match ROLLOVER_SUFFIX.captures(index) {
        Some(caps) if caps["prefix"].chars().any(char::is_alphabetic) => format!("{}*", &caps["prefix"]),
        _ => index.to_string(),
    }
}

/// Group names by pattern; patterns appear in the order their first index was seen
pub fn group_index_patterns<I, S>(indices: I) -> Vec<IndexPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: Vec<IndexPattern> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for index in indices {
        let index = index.as_ref();
        let pattern = pattern_for(index);
        match positions.get(&pattern) {
            Some(&pos) => groups[pos].indices.push(index.to_string()),
            None => {
                positions.insert(pattern.clone(), groups.len());
                groups.push(IndexPattern {
                    pattern,
                    indices: vec![index.to_string()],
                });
            }
        }
    }
    groups
}
