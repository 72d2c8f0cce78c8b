// src/services/playlist.rs

//! Playlist synchronisation.
//!
//! Mutations against one playlist are order-dependent (clear, then add in
//! batches), so they run strictly one after another. Each call is retried on
//! rate limits and timeouts; once the playlist is cleared, a throttled add
//! must not leave it empty.

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{PlaylistConfig, PlaylistId, TrackId};
use crate::services::CatalogClient;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// Outcome of one playlist sync.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub playlist_id: PlaylistId,
    pub created: bool,
    pub tracks_added: usize,
    pub batches: usize,
}

/// Replaces a named playlist's contents with a track payload.
pub struct PlaylistSync<'a> {
    catalog: &'a dyn CatalogClient,
    owner: String,
    name: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a> PlaylistSync<'a> {
    pub fn new(
        catalog: &'a dyn CatalogClient,
        owner: impl Into<String>,
        config: &PlaylistConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            owner: owner.into(),
            name: config.name.clone(),
            batch_size: config.add_batch_size.max(1),
            retry,
        }
    }

    /// Find the playlist by exact name, creating it when absent.
    pub async fn ensure_playlist(&self) -> Result<(PlaylistId, bool)> {
        let existing = retry_with_backoff(&self.retry, "list playlists", || {
            self.catalog.list_playlists(&self.owner)
        })
        .await?;
        if let Some(found) = existing.into_iter().find(|p| p.name == self.name) {
            log::debug!("Using existing playlist '{}' ({})", found.name, found.id);
            return Ok((found.id, false));
        }
        let id = retry_with_backoff(&self.retry, "create playlist", || {
            self.catalog.create_playlist(&self.owner, &self.name)
        })
        .await?;
        Ok((id, true))
    }

    /// Clear the playlist and add `tracks` in order.
    pub async fn sync(&self, tracks: &[TrackId]) -> Result<SyncSummary> {
        if self.owner.is_empty() {
            return Err(AppError::auth("catalog username is empty"));
        }

        let (playlist_id, created) = self.ensure_playlist().await?;
        if !created {
            retry_with_backoff(&self.retry, "clear playlist", || {
                self.catalog.clear_playlist(&playlist_id)
            })
            .await?;
        }

        let mut batches = 0;
        for chunk in tracks.chunks(self.batch_size) {
            let label = format!("add batch {}", batches + 1);
            retry_with_backoff(&self.retry, &label, || {
                self.catalog.add_tracks(&playlist_id, chunk)
            })
            .await
            .inspect_err(|e| {
                log::error!(
                    "Playlist '{}' left partially filled after {} batch(es): {}",
                    self.name,
                    batches,
                    e
                )
            })?;
            batches += 1;
            log::debug!("Added batch {} ({} tracks)", batches, chunk.len());
        }

        log::info!(
            "Playlist '{}' synced: {} tracks in {} batch(es){}",
            self.name,
            tracks.len(),
            batches,
            if created { " (created)" } else { "" }
        );

        Ok(SyncSummary {
            playlist_id,
            created,
            tracks_added: tracks.len(),
            batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::models::PlaylistSummary;

    #[derive(Default)]
    struct RecordingCatalog {
        playlists: Vec<PlaylistSummary>,
        calls: Mutex<Vec<String>>,
        throttle_adds: AtomicU32,
        throttle_creates: AtomicU32,
    }

    impl RecordingCatalog {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogClient for RecordingCatalog {
        async fn search_artist(&self, _name: &str) -> Result<String> {
            unimplemented!()
        }

        async fn top_tracks(&self, _artist_id: &str, _limit: usize) -> Result<Vec<TrackId>> {
            unimplemented!()
        }

        async fn create_playlist(&self, owner: &str, name: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("create {owner} {name}"));
            throttled(&self.throttle_creates)?;
            Ok("new".into())
        }

        async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add {playlist_id} {}", track_ids.join(",")));
            throttled(&self.throttle_adds)
        }

        async fn list_playlists(&self, _owner: &str) -> Result<Vec<PlaylistSummary>> {
            Ok(self.playlists.clone())
        }

        async fn clear_playlist(&self, playlist_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("clear {playlist_id}"));
            Ok(())
        }
    }

    /// Answer 429 while `remaining` is above zero.
    fn throttled(remaining: &AtomicU32) -> Result<()> {
        if remaining.load(Ordering::SeqCst) > 0 {
            remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::RateLimited { retry_after_secs: 0 });
        }
        Ok(())
    }

    fn retry(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn existing_p1() -> RecordingCatalog {
        RecordingCatalog {
            playlists: vec![PlaylistSummary {
                id: "p1".into(),
                name: "Touring Artists".into(),
            }],
            ..Default::default()
        }
    }

    fn config(batch: usize) -> PlaylistConfig {
        PlaylistConfig {
            add_batch_size: batch,
            ..PlaylistConfig::default()
        }
    }

    fn tracks(ids: &[&str]) -> Vec<TrackId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_existing_playlist_cleared_then_batched() {
        let catalog = RecordingCatalog {
            playlists: vec![
                PlaylistSummary {
                    id: "other".into(),
                    name: "Touring Artists (old)".into(),
                },
                PlaylistSummary {
                    id: "p1".into(),
                    name: "Touring Artists".into(),
                },
            ],
            ..Default::default()
        };

        let summary = PlaylistSync::new(&catalog, "me", &config(2), retry(3))
            .sync(&tracks(&["t1", "t2", "t3"]))
            .await
            .unwrap();

        assert_eq!(
            catalog.calls(),
            vec!["clear p1", "add p1 t1,t2", "add p1 t3"]
        );
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.tracks_added, 3);
        assert!(!summary.created);
    }

    #[tokio::test]
    async fn test_missing_playlist_is_created() {
        let catalog = RecordingCatalog::default();

        let summary = PlaylistSync::new(&catalog, "me", &config(100), retry(3))
            .sync(&tracks(&["t1"]))
            .await
            .unwrap();

        assert_eq!(catalog.calls(), vec!["create me Touring Artists", "add new t1"]);
        assert!(summary.created);
        assert_eq!(summary.playlist_id, "new");
    }

    #[tokio::test]
    async fn test_empty_payload_still_clears() {
        let catalog = existing_p1();

        let summary = PlaylistSync::new(&catalog, "me", &config(100), retry(3))
            .sync(&[])
            .await
            .unwrap();

        assert_eq!(catalog.calls(), vec!["clear p1"]);
        assert_eq!(summary.batches, 0);
    }

    #[tokio::test]
    async fn test_empty_owner_rejected() {
        let catalog = RecordingCatalog::default();
        let result = PlaylistSync::new(&catalog, "", &config(100), retry(3)).sync(&[]).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
        assert!(catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_add_after_clear_is_retried() {
        let catalog = existing_p1();
        catalog.throttle_adds.store(1, Ordering::SeqCst);

        let summary = PlaylistSync::new(&catalog, "me", &config(100), retry(3))
            .sync(&tracks(&["t1"]))
            .await
            .unwrap();

        assert_eq!(catalog.calls(), vec!["clear p1", "add p1 t1", "add p1 t1"]);
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.tracks_added, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_create_is_retried() {
        let catalog = RecordingCatalog::default();
        catalog.throttle_creates.store(2, Ordering::SeqCst);

        let summary = PlaylistSync::new(&catalog, "me", &config(100), retry(3))
            .sync(&tracks(&["t1"]))
            .await
            .unwrap();

        assert_eq!(
            catalog.calls(),
            vec![
                "create me Touring Artists",
                "create me Touring Artists",
                "create me Touring Artists",
                "add new t1",
            ]
        );
        assert!(summary.created);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_surfaces_error() {
        let catalog = existing_p1();
        catalog.throttle_adds.store(10, Ordering::SeqCst);

        let result = PlaylistSync::new(&catalog, "me", &config(100), retry(1))
            .sync(&tracks(&["t1"]))
            .await;

        assert!(matches!(result, Err(AppError::RateLimited { .. })));
        assert_eq!(catalog.calls(), vec!["clear p1", "add p1 t1", "add p1 t1"]);
    }
}
