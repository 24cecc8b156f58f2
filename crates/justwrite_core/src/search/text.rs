//! Plain-text search and hashtag counting over post files.
//!
//! # Invariants
//! - Unreadable files are skipped, never reported.
//! - Tag names exclude the `#` marker and stop at whitespace or ASCII
//!   punctuation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([^\s[:punct:]]+)").expect("valid hashtag regex"));

/// Tag name to occurrence count, ordered by tag.
pub type Tags = BTreeMap<String, usize>;

/// Returns the paths whose contents contain `query`.
pub fn search_files(paths: &[PathBuf], query: &str) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            fs::read_to_string(path)
                .map(|contents| contents.contains(query))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Counts hashtags in one text.
pub fn tags_in(text: &str, tags: &mut Tags) {
    for caps in HASHTAG_RE.captures_iter(text) {
        if let Some(tag) = caps.get(1) {
            *tags.entry(tag.as_str().to_string()).or_insert(0) += 1;
        }
    }
}

/// Counts hashtags across all readable files.
pub fn count_tags(paths: &[PathBuf]) -> Tags {
    let mut tags = Tags::new();
    for path in paths {
        if let Ok(contents) = fs::read_to_string(path) {
            tags_in(&contents, &mut tags);
        }
    }
    tags
}
