//! Streaming catalog identifiers and resolution results.

use serde::{Deserialize, Serialize};

/// Catalog artist identifier.
pub type ArtistId = String;

/// Catalog track identifier.
pub type TrackId = String;

/// Catalog playlist identifier.
pub type PlaylistId = String;

/// A playlist as listed for its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
}

/// One artist matched in the catalog with its top tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedArtist {
    pub name: String,
    pub artist_id: ArtistId,
    pub tracks: Vec<TrackId>,
}

/// Outcome of resolving an artist list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Matched artists, in input order
    pub resolved: Vec<ResolvedArtist>,

    /// Artists absent from the catalog
    pub unresolved: Vec<String>,

    /// Artists skipped after a per-artist failure (name, reason)
    pub failed: Vec<(String, String)>,
}

impl Resolution {
    /// Union of all track ids, first occurrence wins.
    pub fn track_payload(&self) -> Vec<TrackId> {
        let mut seen = std::collections::HashSet::new();
        self.resolved
            .iter()
            .flat_map(|artist| artist.tracks.iter())
            .filter(|track| seen.insert(track.as_str()))
            .cloned()
            .collect()
    }

    /// Names of matched artists.
    pub fn resolved_names(&self) -> impl Iterator<Item = &str> {
        self.resolved.iter().map(|a| a.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_payload_dedups_in_order() {
        let resolution = Resolution {
            resolved: vec![
                ResolvedArtist {
                    name: "A".into(),
                    artist_id: "a".into(),
                    tracks: vec!["t1".into(), "t2".into()],
                },
                ResolvedArtist {
                    name: "B".into(),
                    artist_id: "b".into(),
                    tracks: vec!["t2".into(), "t3".into()],
                },
            ],
            ..Default::default()
        };

        assert_eq!(resolution.track_payload(), vec!["t1", "t2", "t3"]);
    }
}
