//! Gated record types and the dataset published per run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Gate id stamped on staging rows.
pub const STAGING_GATE: u32 = 1000;

/// Gate id stamped on concert fact rows.
pub const CONCERT_GATE: u32 = 2000;

/// Gate id stamped on artist dimension rows.
pub const ARTIST_GATE: u32 = 4000;

/// Text format of `StagingRecord::show_date`, e.g. "Monday, March 3 2025".
pub const SHOW_DATE_FORMAT: &str = "%A, %B %-d %Y";

/// One row per artist appearance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingRecord {
    /// Emission index; dense, 0-based
    pub source_row_id: u64,
    pub artist: String,
    /// Date as text; parsed again by the concert gate
    pub show_date: String,
    pub show_location: String,
    pub show_info: String,
    pub gate_id: u32,
}

/// Artist dimension row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistRecord {
    pub artist_key: u64,
    /// First staging row that introduced this artist
    pub source_row_id: u64,
    pub artist: String,
    pub gate_id: u32,
}

/// Concert fact row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcertRecord {
    pub show_key: u64,
    pub source_row_id: u64,
    pub show_date: NaiveDate,
    pub show_location: String,
    pub gate_id: u32,
}

/// Staging row the concert gate could not type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedRow {
    pub source_row_id: u64,
    pub text: String,
    pub reason: String,
}

/// Everything one run publishes to the sink, as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    /// Run timestamp, the sink key
    pub run_at: DateTime<Utc>,

    /// Digest of the staging rows; equal for identical listings
    pub fingerprint: String,

    pub staging: Vec<StagingRecord>,
    pub artists: Vec<ArtistRecord>,
    pub concerts: Vec<ConcertRecord>,
    pub upcoming: Vec<ConcertRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl Dataset {
    /// Distinct artist names in dimension order.
    pub fn artist_names(&self) -> Vec<&str> {
        self.artists.iter().map(|a| a.artist.as_str()).collect()
    }

    /// True when every published table matches `other`; `run_at` is ignored.
    ///
    /// The fingerprint alone is not enough: `upcoming` depends on the run
    /// time, so an unchanged listing can still yield new derived rows.
    pub fn same_tables(&self, other: &Dataset) -> bool {
        self.fingerprint == other.fingerprint
            && self.staging == other.staging
            && self.artists == other.artists
            && self.concerts == other.concerts
            && self.upcoming == other.upcoming
            && self.rejected == other.rejected
    }
}
