// src/models/mod.rs

//! Domain models for the tourlist pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod event;
mod index;
mod records;

// Re-export all public types
pub use catalog::{ArtistId, PlaylistId, PlaylistSummary, Resolution, ResolvedArtist, TrackId};
pub use config::{
    CatalogConfig, CatalogCredentials, Config, ExtractConfig, FetchConfig, GateConfig,
    LoggingConfig, PlaylistConfig, ShowKeyScheme, StorageConfig,
};
pub use event::{Event, Show};
pub use index::{ArtistIndex, ArtistIndexEntry, is_after, is_sentinel};
pub use records::{
    ARTIST_GATE, ArtistRecord, CONCERT_GATE, ConcertRecord, Dataset, RejectedRow,
    SHOW_DATE_FORMAT, STAGING_GATE, StagingRecord,
};
