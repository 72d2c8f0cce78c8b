// src/pipeline/gate.rs

//! Dimension and fact gates derived from staging rows.
//!
//! - Artist dimension (gate 4000): one row per distinct artist, first-seen wins.
//! - Concert fact (gate 2000): one row per staging row, date-typed and keyed.
//! - Upcoming shows: concert rows after "now".

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{
    ARTIST_GATE, ArtistRecord, CONCERT_GATE, ConcertRecord, RejectedRow, STAGING_GATE,
    ShowKeyScheme, StagingRecord, is_after,
};
use crate::utils::dates::parse_show_date;

/// Artist dimension.
///
/// Duplicates are removed keeping the first occurrence in staging order
/// (exact, case-sensitive match). With `n` survivors, the `i`-th gets
/// `artist_key = 1000 + (n - 1 - i)`: the last artist to appear in staging
/// holds the base key. Keys are unique and fixed for a given staging order.
pub fn derive_artists(staging: &[StagingRecord]) -> Vec<ArtistRecord> {
    let mut seen = HashSet::new();
    let representatives: Vec<&StagingRecord> = staging
        .iter()
        .filter(|row| seen.insert(row.artist.as_str()))
        .collect();

    let n = representatives.len() as u64;
    let artists: Vec<ArtistRecord> = representatives
        .into_iter()
        .enumerate()
        .map(|(i, row)| ArtistRecord {
            artist_key: STAGING_GATE as u64 + (n - 1 - i as u64),
            source_row_id: row.source_row_id,
            artist: row.artist.clone(),
            gate_id: ARTIST_GATE,
        })
        .collect();

    log::info!(
        "Artist gate: {} distinct artist(s) from {} row(s)",
        artists.len(),
        staging.len()
    );
    artists
}

/// Concert rows plus the staging rows that could not be typed.
#[derive(Debug, Clone, Default)]
pub struct ConcertDerivation {
    pub records: Vec<ConcertRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Concert fact.
///
/// Rows whose `show_date` does not parse are skipped and reported in
/// `rejected`. Fails only when two rows derive the same key.
pub fn derive_concerts(staging: &[StagingRecord], scheme: ShowKeyScheme) -> Result<ConcertDerivation> {
    let mut derivation = ConcertDerivation::default();
    let mut keys = HashSet::with_capacity(staging.len());

    for row in staging {
        let Some(show_date) = parse_show_date(&row.show_date) else {
            let error = AppError::DateParse {
                row: row.source_row_id,
                text: row.show_date.clone(),
            };
            log::warn!("Skipping staging row: {}", error);
            derivation.rejected.push(RejectedRow {
                source_row_id: row.source_row_id,
                text: row.show_date.clone(),
                reason: error.to_string(),
            });
            continue;
        };

        let show_key = show_key(scheme, row.source_row_id, show_date)?;
        if !keys.insert(show_key) {
            return Err(AppError::KeyCollision { key: show_key });
        }

        derivation.records.push(ConcertRecord {
            show_key,
            source_row_id: row.source_row_id,
            show_date,
            show_location: row.show_location.clone(),
            gate_id: CONCERT_GATE,
        });
    }

    log::info!(
        "Concert gate: {} row(s), {} rejected",
        derivation.records.len(),
        derivation.rejected.len()
    );
    Ok(derivation)
}

/// Concert rows whose date (at 00:00) is strictly after `now`.
pub fn derive_upcoming(concerts: &[ConcertRecord], now: NaiveDateTime) -> Vec<ConcertRecord> {
    concerts
        .iter()
        .filter(|c| is_after(c.show_date, now))
        .cloned()
        .collect()
}

/// Surrogate key for a concert row.
pub fn show_key(scheme: ShowKeyScheme, source_row_id: u64, show_date: NaiveDate) -> Result<u64> {
    match scheme {
        ShowKeyScheme::Hashed => {
            let digest = Sha256::digest(format!("{}|{}", source_row_id, show_date).as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            Ok(u64::from_be_bytes(head) & (u64::MAX >> 1))
        }
        ShowKeyScheme::Legacy => format!("{}{}", source_row_id, show_date.day())
            .parse()
            .map_err(|e| AppError::validation(format!("legacy show key overflow: {e}"))),
    }
}

/// The three gated tables of one run, produced together or not at all.
#[derive(Debug, Clone, Default)]
pub struct GateTables {
    pub artists: Vec<ArtistRecord>,
    pub concerts: Vec<ConcertRecord>,
    pub upcoming: Vec<ConcertRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl GateTables {
    pub fn derive(
        staging: &[StagingRecord],
        scheme: ShowKeyScheme,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let artists = derive_artists(staging);
        let ConcertDerivation { records, rejected } = derive_concerts(staging, scheme)?;
        let upcoming = derive_upcoming(&records, now);

        Ok(Self {
            artists,
            concerts: records,
            upcoming,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dates::format_show_date;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn row(id: u64, artist: &str, day: u32) -> StagingRecord {
        StagingRecord {
            source_row_id: id,
            artist: artist.into(),
            show_date: format_show_date(date(day)),
            show_location: format!("Venue {id}"),
            show_info: String::new(),
            gate_id: STAGING_GATE,
        }
    }

    fn staging(artists: &[(&str, u32)]) -> Vec<StagingRecord> {
        artists
            .iter()
            .enumerate()
            .map(|(i, (a, d))| row(i as u64, a, *d))
            .collect()
    }

    #[test]
    fn test_derive_artists_first_seen_and_reverse_rank() {
        let rows = staging(&[("A", 3), ("B", 3), ("A", 4), ("C", 4), ("B", 5)]);
        let artists = derive_artists(&rows);

        let names: Vec<&str> = artists.iter().map(|a| a.artist.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let sources: Vec<u64> = artists.iter().map(|a| a.source_row_id).collect();
        assert_eq!(sources, vec![0, 1, 3]);

        let keys: Vec<u64> = artists.iter().map(|a| a.artist_key).collect();
        assert_eq!(keys, vec![1002, 1001, 1000]);
        assert!(artists.iter().all(|a| a.gate_id == ARTIST_GATE));
    }

    #[test]
    fn test_derive_artists_is_case_sensitive() {
        let rows = staging(&[("Band", 3), ("band", 3)]);
        assert_eq!(derive_artists(&rows).len(), 2);
    }

    #[test]
    fn test_derive_artists_keys_unique() {
        let rows = staging(&[("A", 3), ("B", 3), ("C", 3), ("A", 3), ("D", 4)]);
        let artists = derive_artists(&rows);
        let keys: HashSet<u64> = artists.iter().map(|a| a.artist_key).collect();
        assert_eq!(keys.len(), artists.len());
    }

    #[test]
    fn test_derive_concerts_one_row_per_staging_row() {
        let rows = staging(&[("A", 3), ("B", 3), ("A", 4)]);
        let derived = derive_concerts(&rows, ShowKeyScheme::Hashed).unwrap();

        assert_eq!(derived.records.len(), rows.len());
        assert!(derived.rejected.is_empty());
        assert_eq!(derived.records[2].show_date, date(4));
        assert_eq!(derived.records[2].show_location, "Venue 2");
        assert!(derived.records.iter().all(|c| c.gate_id == CONCERT_GATE));

        let keys: HashSet<u64> = derived.records.iter().map(|c| c.show_key).collect();
        assert_eq!(keys.len(), rows.len());
    }

    #[test]
    fn test_derive_concerts_skips_malformed_date() {
        let mut rows = staging(&[("A", 3), ("B", 3)]);
        rows[1].show_date = "Fooday, Marchtember 99".into();

        let derived = derive_concerts(&rows, ShowKeyScheme::Hashed).unwrap();
        assert_eq!(derived.records.len(), 1);
        assert_eq!(derived.rejected.len(), 1);
        assert_eq!(derived.rejected[0].source_row_id, 1);
        assert_eq!(derived.rejected[0].text, "Fooday, Marchtember 99");
    }

    #[test]
    fn test_legacy_key_concatenates_row_and_day() {
        assert_eq!(show_key(ShowKeyScheme::Legacy, 4, date(17)).unwrap(), 417);
        assert_eq!(show_key(ShowKeyScheme::Legacy, 0, date(3)).unwrap(), 3);
    }

    #[test]
    fn test_legacy_key_collision_is_reported() {
        // Row 1 on the 23rd and row 12 on the 3rd both concatenate to 123.
        let mut rows: Vec<StagingRecord> = (0..13).map(|i| row(i, "X", 10)).collect();
        rows[1] = row(1, "X", 23);
        rows[12] = row(12, "X", 3);

        let err = derive_concerts(&rows, ShowKeyScheme::Legacy).unwrap_err();
        assert!(matches!(err, AppError::KeyCollision { key: 123 }));

        assert!(derive_concerts(&rows, ShowKeyScheme::Hashed).is_ok());
    }

    #[test]
    fn test_hashed_key_is_stable() {
        let a = show_key(ShowKeyScheme::Hashed, 7, date(3)).unwrap();
        let b = show_key(ShowKeyScheme::Hashed, 7, date(3)).unwrap();
        let c = show_key(ShowKeyScheme::Hashed, 7, date(4)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a <= i64::MAX as u64);
    }

    #[test]
    fn test_derive_upcoming_is_strict() {
        let rows = staging(&[("A", 3), ("B", 4), ("C", 5)]);
        let concerts = derive_concerts(&rows, ShowKeyScheme::Hashed).unwrap().records;
        let now = date(4).and_hms_opt(0, 0, 0).unwrap();

        let upcoming = derive_upcoming(&concerts, now);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].show_date, date(5));
        assert_eq!(upcoming[0].show_key, concerts[2].show_key);
    }

    #[test]
    fn test_empty_staging() {
        assert!(derive_artists(&[]).is_empty());
        let derived = derive_concerts(&[], ShowKeyScheme::Legacy).unwrap();
        assert!(derived.records.is_empty());
        assert!(derived.rejected.is_empty());
    }

    #[test]
    fn test_gate_tables_are_deterministic() {
        let rows = staging(&[("A", 3), ("B", 4), ("A", 5)]);
        let now = date(1).and_hms_opt(9, 0, 0).unwrap();
        let first = GateTables::derive(&rows, ShowKeyScheme::Hashed, now).unwrap();
        let second = GateTables::derive(&rows, ShowKeyScheme::Hashed, now).unwrap();
        assert_eq!(first.artists, second.artists);
        assert_eq!(first.concerts, second.concerts);
        assert_eq!(first.upcoming.len(), 3);
    }
}
