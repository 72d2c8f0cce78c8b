// src/pipeline/staging.rs

//! Staging gate: one row per artist appearance.

use sha2::{Digest, Sha256};

use crate::models::{Event, STAGING_GATE, StagingRecord};
use crate::utils::dates::format_show_date;

/// Flatten events into staging rows, in event, show, then artist order.
///
/// `source_row_id` is the emission index, so rows are dense and totally
/// ordered; later gates derive their keys from it.
pub fn flatten(events: &[Event]) -> Vec<StagingRecord> {
    let mut rows = Vec::with_capacity(events.iter().map(Event::appearance_count).sum());

    for event in events {
        let show_date = format_show_date(event.date);
        for show in &event.shows {
            for artist in &show.artists {
                rows.push(StagingRecord {
                    source_row_id: rows.len() as u64,
                    artist: artist.clone(),
                    show_date: show_date.clone(),
                    show_location: show.location.clone(),
                    show_info: show.info.clone(),
                    gate_id: STAGING_GATE,
                });
            }
        }
    }

    log::info!("Staging: {} row(s) from {} date(s)", rows.len(), events.len());
    rows
}

/// SHA-256 hex digest over the staging rows. Identical listings give
/// identical fingerprints.
pub fn fingerprint(rows: &[StagingRecord]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(row.source_row_id.to_be_bytes());
        for field in [&row.artist, &row.show_date, &row.show_location, &row.show_info] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}
