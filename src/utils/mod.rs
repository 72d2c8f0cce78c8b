//! Utility functions and helpers.

pub mod dates;
pub mod retry;

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an artist display name: drop non-breaking spaces, collapse whitespace.
pub fn clean_artist_name(raw: &str) -> String {
    normalize_whitespace(&raw.replace('\u{a0}', ""))
}
