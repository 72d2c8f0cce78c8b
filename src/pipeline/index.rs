//! Artist/date index generation.
//!
//! Builds two lookups over one extraction run:
//!
//! - `artist_to_dates`: every date an artist appears, once per show that
//!   lists them
//! - `date_to_artists`: booked artists per date, placeholder slots removed
//!
//! > Example: `{"Band A": ["2025-03-03", "2025-03-07"]}` and
//! > `{"2025-03-03": ["Band A"]}`

use std::collections::HashSet;

use crate::models::{ArtistIndex, Event, is_sentinel};

/// Build both indexes. `sentinel` names the placeholder act ("open mic").
pub fn build_indexes(events: &[Event], sentinel: &str) -> ArtistIndex {
    let mut index = ArtistIndex::default();

    for event in events {
        let mut booked: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for show in &event.shows {
            let mut in_show: HashSet<&str> = HashSet::new();
            for artist in &show.artists {
                if !in_show.insert(artist.as_str()) {
                    continue;
                }
                index
                    .artist_to_dates
                    .entry(artist.clone())
                    .or_default()
                    .dates
                    .push(event.date);

                if !is_sentinel(artist, sentinel) && seen.insert(artist.as_str()) {
                    booked.push(artist.clone());
                }
            }
        }

        index
            .date_to_artists
            .entry(event.date)
            .or_default()
            .extend(booked);
    }

    log::info!(
        "Index: {} artist(s) across {} date(s)",
        index.artist_to_dates.len(),
        index.date_to_artists.len()
    );
    index
}
