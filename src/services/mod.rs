//! Service layer.
//!
//! - Listing extraction (`EventExtractor`)
//! - Page fetching (`PageFetcher`, `HttpFetcher`, `FileFetcher`, `RetryingFetcher`)
//! - Streaming catalog access (`CatalogClient`, `HttpCatalog`)
//! - Artist resolution (`CatalogResolver`)
//! - Playlist mutation (`PlaylistSync`)

mod catalog;
mod extractor;
mod fetcher;
mod playlist;
mod resolver;

pub use catalog::{CatalogClient, HttpCatalog};
pub use extractor::EventExtractor;
pub use fetcher::{FileFetcher, HttpFetcher, PageFetcher, RetryingFetcher};
pub use playlist::{PlaylistSync, SyncSummary};
pub use resolver::CatalogResolver;
