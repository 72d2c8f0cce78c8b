//! Roster diff between runs.
//!
//! Computes which artists joined or left the listing since the previously
//! published dataset, for the run report and logs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::Dataset;

/// Artists added to and removed from the listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// In current but not in previous, current order
    pub added: Vec<String>,
    /// In previous but not in current, previous order
    pub removed: Vec<String>,
}

impl RosterDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Diff the artist dimension of two datasets. A missing previous dataset
/// counts as an empty roster.
pub fn calculate_diff(previous: Option<&Dataset>, current: &Dataset) -> RosterDiff {
    let prev_names: Vec<&str> = previous.map(Dataset::artist_names).unwrap_or_default();
    let curr_names = current.artist_names();
    diff_names(&prev_names, &curr_names)
}

fn diff_names(previous: &[&str], current: &[&str]) -> RosterDiff {
    let prev_set: HashSet<&str> = previous.iter().copied().collect();
    let curr_set: HashSet<&str> = current.iter().copied().collect();

    RosterDiff {
        added: current
            .iter()
            .filter(|name| !prev_set.contains(*name))
            .map(|name| name.to_string())
            .collect(),
        removed: previous
            .iter()
            .filter(|name| !curr_set.contains(*name))
            .map(|name| name.to_string())
            .collect(),
    }
}
