// src/services/resolver.rs

//! Artist resolution against the streaming catalog.
//!
//! Lookups are independent per artist, so they fan out over a bounded
//! stream. Artists the catalog does not know are skipped and recorded; a
//! credential failure aborts the whole resolution.

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, Resolution, ResolvedArtist};
use crate::services::CatalogClient;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// Resolves artist names to catalog ids and top tracks.
pub struct CatalogResolver<'a> {
    catalog: &'a dyn CatalogClient,
    max_concurrent: usize,
    retry: RetryPolicy,
    tracks_per_artist: usize,
}

enum Lookup {
    Found(ResolvedArtist),
    NotFound,
    Failed(String),
}

impl<'a> CatalogResolver<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, config: &CatalogConfig, tracks_per_artist: usize) -> Self {
        Self {
            catalog,
            max_concurrent: config.max_concurrent.max(1),
            retry: config.retry_policy(),
            tracks_per_artist,
        }
    }

    /// Resolve every name. Output keeps input order.
    pub async fn resolve(&self, artists: &[&str]) -> Result<Resolution> {
        log::info!(
            "Resolving {} artist(s) with up to {} concurrent lookups",
            artists.len(),
            self.max_concurrent
        );

        let mut lookups = stream::iter(artists.iter().copied().enumerate())
            .map(|(position, name)| async move { (position, name, self.lookup(name).await) })
            .buffer_unordered(self.max_concurrent);

        let mut outcomes: Vec<(usize, &str, Lookup)> = Vec::with_capacity(artists.len());
        while let Some((position, name, result)) = lookups.next().await {
            match result {
                Ok(lookup) => outcomes.push((position, name, lookup)),
                Err(e @ AppError::Auth(_)) => {
                    log::error!("Catalog rejected credentials while resolving '{}'", name);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("Skipping '{}': {}", name, e);
                    outcomes.push((position, name, Lookup::Failed(e.to_string())));
                }
            }
        }
        outcomes.sort_by_key(|(position, _, _)| *position);

        let mut resolution = Resolution::default();
        for (_, name, lookup) in outcomes {
            match lookup {
                Lookup::Found(artist) => resolution.resolved.push(artist),
                Lookup::NotFound => resolution.unresolved.push(name.to_string()),
                Lookup::Failed(reason) => resolution.failed.push((name.to_string(), reason)),
            }
        }

        log::info!(
            "Resolved {} artist(s); {} not in catalog, {} failed",
            resolution.resolved.len(),
            resolution.unresolved.len(),
            resolution.failed.len()
        );
        Ok(resolution)
    }

    async fn lookup(&self, name: &str) -> Result<Lookup> {
        let label = format!("catalog search '{name}'");
        let searched =
            retry_with_backoff(&self.retry, &label, || self.catalog.search_artist(name)).await;
        let artist_id = match searched {
            Ok(id) => id,
            Err(AppError::ArtistNotFound(_)) => {
                log::warn!("Artist not found in catalog: {}", name);
                return Ok(Lookup::NotFound);
            }
            Err(e) => return Err(e),
        };

        let label = format!("top tracks for '{name}'");
        let tracks = retry_with_backoff(&self.retry, &label, || {
            self.catalog.top_tracks(&artist_id, self.tracks_per_artist)
        })
        .await?;
        log::debug!("{} -> {} ({} tracks)", name, artist_id, tracks.len());

        Ok(Lookup::Found(ResolvedArtist {
            name: name.to_string(),
            artist_id,
            tracks: tracks.into_iter().take(self.tracks_per_artist).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{PlaylistSummary, TrackId};

    #[derive(Default)]
    struct FakeCatalog {
        artists: HashMap<String, Vec<TrackId>>,
        rate_limit_first: AtomicU32,
        time_out_first: AtomicU32,
        auth_fails_for: Option<String>,
        searches: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn with(artists: &[(&str, &[&str])]) -> Self {
            Self {
                artists: artists
                    .iter()
                    .map(|(name, tracks)| {
                        (name.to_string(), tracks.iter().map(|t| t.to_string()).collect())
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn search_artist(&self, name: &str) -> Result<String> {
            self.searches.lock().unwrap().push(name.to_string());
            if self.auth_fails_for.as_deref() == Some(name) {
                return Err(AppError::auth("expired"));
            }
            if self.rate_limit_first.load(Ordering::SeqCst) > 0 {
                self.rate_limit_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::RateLimited { retry_after_secs: 0 });
            }
            if self.time_out_first.load(Ordering::SeqCst) > 0 {
                self.time_out_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Timeout(format!("search {name}")));
            }
            if self.artists.contains_key(name) {
                Ok(format!("id-{name}"))
            } else {
                Err(AppError::ArtistNotFound(name.to_string()))
            }
        }

        async fn top_tracks(&self, artist_id: &str, limit: usize) -> Result<Vec<TrackId>> {
            let name = artist_id.trim_start_matches("id-");
            Ok(self.artists[name].iter().take(limit).cloned().collect())
        }

        async fn create_playlist(&self, _owner: &str, _name: &str) -> Result<String> {
            unimplemented!()
        }

        async fn add_tracks(&self, _playlist_id: &str, _track_ids: &[TrackId]) -> Result<()> {
            unimplemented!()
        }

        async fn list_playlists(&self, _owner: &str) -> Result<Vec<PlaylistSummary>> {
            unimplemented!()
        }

        async fn clear_playlist(&self, _playlist_id: &str) -> Result<()> {
            unimplemented!()
        }
    }

    fn fast_config(retries: u32) -> CatalogConfig {
        CatalogConfig {
            max_rate_limit_retries: retries,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            ..CatalogConfig::default()
        }
    }

    fn resolver(catalog: &FakeCatalog, tracks: usize) -> CatalogResolver<'_> {
        CatalogResolver::new(catalog, &fast_config(3), tracks)
    }

    #[tokio::test]
    async fn test_resolve_keeps_order_and_skips_unknown() {
        let catalog = FakeCatalog::with(&[("A", &["a1", "a2"]), ("C", &["c1"])]);
        let resolution = resolver(&catalog, 10).resolve(&["A", "B", "C"]).await.unwrap();

        let names: Vec<&str> = resolution.resolved_names().collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(resolution.unresolved, vec!["B"]);
        assert!(resolution.failed.is_empty());
        assert_eq!(resolution.track_payload(), vec!["a1", "a2", "c1"]);
    }

    #[tokio::test]
    async fn test_tracks_capped_per_artist() {
        let catalog = FakeCatalog::with(&[("A", &["1", "2", "3", "4"])]);
        let resolution = resolver(&catalog, 2).resolve(&["A"]).await.unwrap();
        assert_eq!(resolution.resolved[0].tracks, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let catalog = FakeCatalog::with(&[("A", &["a1"])]);
        catalog.rate_limit_first.store(2, Ordering::SeqCst);

        let resolution = resolver(&catalog, 10).resolve(&["A"]).await.unwrap();
        assert_eq!(resolution.resolved.len(), 1);
        assert_eq!(catalog.searches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_is_recorded_as_failed() {
        let catalog = FakeCatalog::with(&[("A", &["a1"])]);
        catalog.rate_limit_first.store(2, Ordering::SeqCst);

        let resolution = CatalogResolver::new(&catalog, &fast_config(0), 10)
            .resolve(&["A"])
            .await
            .unwrap();
        assert!(resolution.resolved.is_empty());
        assert_eq!(resolution.failed.len(), 1);
        assert_eq!(resolution.failed[0].0, "A");
        assert_eq!(catalog.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_backs_off_before_retry() {
        let catalog = FakeCatalog::with(&[("A", &["a1"])]);
        catalog.time_out_first.store(1, Ordering::SeqCst);
        let config = CatalogConfig {
            backoff_base_ms: 400,
            backoff_max_ms: 400,
            ..CatalogConfig::default()
        };

        let started = tokio::time::Instant::now();
        let resolution = CatalogResolver::new(&catalog, &config, 10)
            .resolve(&["A"])
            .await
            .unwrap();

        assert_eq!(resolution.resolved.len(), 1);
        assert_eq!(catalog.searches.lock().unwrap().len(), 2);
        assert!(started.elapsed() >= std::time::Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_auth_error_aborts() {
        let mut catalog = FakeCatalog::with(&[("A", &["a1"])]);
        catalog.auth_fails_for = Some("A".into());

        let result = resolver(&catalog, 10).resolve(&["A", "B"]).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let catalog = FakeCatalog::default();
        let resolution = resolver(&catalog, 10).resolve(&[]).await.unwrap();
        assert!(resolution.resolved.is_empty());
    }
}
