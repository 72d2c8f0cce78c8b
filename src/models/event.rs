//! Event model produced by extraction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar date of concert activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Show date, year inferred from the extraction reference date
    pub date: NaiveDate,

    /// Number of shows the listing reports for this date
    pub event_count: u32,

    /// Raw text of the count paragraph, kept for audit
    pub event_count_text: String,

    /// Shows in document order
    pub shows: Vec<Show>,
}

impl Event {
    /// Number of artist appearances across all shows.
    pub fn appearance_count(&self) -> usize {
        self.shows.iter().map(|s| s.artists.len()).sum()
    }
}

/// One venue's lineup on an event date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    /// Venue name
    pub location: String,

    /// Artist display names in document order; may be empty
    pub artists: Vec<String>,

    /// Unparsed time/price details
    pub info: String,
}
