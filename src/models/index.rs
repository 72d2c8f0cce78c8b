//! Artist- and date-centric lookup indexes.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Every show date of one artist, plus enrichment flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistIndexEntry {
    /// One date per show appearance; repeats when an artist plays twice a day
    pub dates: Vec<NaiveDate>,

    /// Artist resolved against the streaming catalog
    pub seen_in_catalog: bool,

    /// At least one show date strictly after "now"
    pub has_future_show: bool,
}

impl ArtistIndexEntry {
    /// Number of show appearances.
    pub fn show_count(&self) -> usize {
        self.dates.len()
    }
}

/// Secondary indexes over one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistIndex {
    pub artist_to_dates: BTreeMap<String, ArtistIndexEntry>,
    /// Booked artists per date, sentinel excluded; empty means no touring act
    pub date_to_artists: BTreeMap<NaiveDate, Vec<String>>,
}

impl ArtistIndex {
    /// Populate `has_future_show` and `seen_in_catalog`.
    pub fn enrich<'a>(&mut self, now: NaiveDateTime, resolved: impl IntoIterator<Item = &'a str>) {
        let resolved: HashSet<&str> = resolved.into_iter().collect();
        for (artist, entry) in self.artist_to_dates.iter_mut() {
            entry.seen_in_catalog = resolved.contains(artist.as_str());
            entry.has_future_show = entry.dates.iter().any(|date| is_after(*date, now));
        }
    }

    /// Artists other than the sentinel, in name order.
    pub fn touring_artists(&self, sentinel: &str) -> Vec<&str> {
        self.artist_to_dates
            .keys()
            .filter(|name| !is_sentinel(name, sentinel))
            .map(String::as_str)
            .collect()
    }

    /// Artists with at least one show after the last enrichment's "now".
    pub fn with_future_shows(&self) -> HashSet<&str> {
        self.artist_to_dates
            .iter()
            .filter(|(_, entry)| entry.has_future_show)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Whether a show date (taken at 00:00) is strictly later than `now`.
pub fn is_after(date: NaiveDate, now: NaiveDateTime) -> bool {
    date.and_hms_opt(0, 0, 0).is_some_and(|start| start > now)
}

/// Case-insensitive match against the placeholder artist name.
pub fn is_sentinel(name: &str, sentinel: &str) -> bool {
    name.trim().to_lowercase() == sentinel.trim().to_lowercase()
}
