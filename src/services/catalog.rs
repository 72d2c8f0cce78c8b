// src/services/catalog.rs

//! Streaming catalog client.
//!
//! [`CatalogClient`] is the contract the pipeline needs from the streaming
//! service; [`HttpCatalog`] implements it against a Spotify-compatible Web API
//! using a bearer token obtained outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    ArtistId, CatalogConfig, CatalogCredentials, PlaylistId, PlaylistSummary, TrackId,
};

/// Catalog lookups and playlist mutation.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Best catalog match for an artist name, or `ArtistNotFound`.
    async fn search_artist(&self, name: &str) -> Result<ArtistId>;

    /// Up to `limit` top tracks for an artist.
    async fn top_tracks(&self, artist_id: &str, limit: usize) -> Result<Vec<TrackId>>;

    async fn create_playlist(&self, owner: &str, name: &str) -> Result<PlaylistId>;

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()>;

    async fn list_playlists(&self, owner: &str) -> Result<Vec<PlaylistSummary>>;

    /// Remove every track from a playlist.
    async fn clear_playlist(&self, playlist_id: &str) -> Result<()>;
}

/// Web API catalog client.
pub struct HttpCatalog {
    client: Client,
    base: Url,
    market: String,
    token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    artists: Page<ArtistItem>,
}

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct ArtistItem {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TopTracksResponse {
    tracks: Vec<TrackItem>,
}

#[derive(Deserialize)]
struct TrackItem {
    id: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    id: String,
    name: String,
}

const SEARCH_LIMIT: &str = "5";
const PLAYLIST_PAGE_LIMIT: &str = "50";

impl HttpCatalog {
    /// Create a client from config and credentials loaded by the caller.
    pub fn new(config: &CatalogConfig, credentials: &CatalogCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let mut base = Url::parse(&config.api_base)?;
        if base.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "catalog.api_base is not a base URL: {}",
                config.api_base
            )));
        }
        // Url::path_segments_mut appends after the last segment; drop a trailing slash.
        let trimmed = base.path().trim_end_matches('/').to_string();
        base.set_path(&trimmed);

        Ok(Self {
            client,
            base,
            market: config.market.clone(),
            token: credentials.access_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config("catalog.api_base is not a base URL"))?
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, label: &str) -> Result<Response> {
        let response = request.bearer_auth(&self.token).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(label.to_string())
            } else {
                AppError::fetch(label, None, e)
            }
        })?;
        check_status(response, label)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, label: &str) -> Result<T> {
        let response = self.send(self.client.get(url), label).await?;
        Ok(response.json().await?)
    }
}

/// Map catalog status codes onto the error taxonomy.
fn check_status(response: Response, label: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::auth(format!(
            "{label}: catalog rejected credentials ({status})"
        ))),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1);
            Err(AppError::RateLimited { retry_after_secs })
        }
        _ => Err(AppError::fetch(label, Some(status.as_u16()), status)),
    }
}

/// Prefer an exact (case-insensitive) name match, else the top result.
fn pick_artist(name: &str, items: Vec<ArtistItem>) -> Option<ArtistId> {
    let wanted = name.to_lowercase();
    let exact = items.iter().position(|a| a.name.to_lowercase() == wanted);
    let index = exact.unwrap_or(0);
    items.into_iter().nth(index).map(|a| a.id)
}

#[async_trait]
impl CatalogClient for HttpCatalog {
    async fn search_artist(&self, name: &str) -> Result<ArtistId> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut()
            .append_pair("q", &format!("artist:{name}"))
            .append_pair("type", "artist")
            .append_pair("limit", SEARCH_LIMIT);

        let body: SearchResponse = self.get_json(url, "search").await?;
        pick_artist(name, body.artists.items).ok_or_else(|| AppError::ArtistNotFound(name.into()))
    }

    async fn top_tracks(&self, artist_id: &str, limit: usize) -> Result<Vec<TrackId>> {
        let mut url = self.endpoint(&["artists", artist_id, "top-tracks"])?;
        url.query_pairs_mut().append_pair("market", &self.market);

        let body: TopTracksResponse = self.get_json(url, "top-tracks").await?;
        Ok(body
            .tracks
            .into_iter()
            .filter_map(|t| t.id)
            .take(limit)
            .collect())
    }

    async fn create_playlist(&self, owner: &str, name: &str) -> Result<PlaylistId> {
        let url = self.endpoint(&["users", owner, "playlists"])?;
        let body = serde_json::json!({ "name": name, "public": false });
        let response = self
            .send(self.client.post(url).json(&body), "create-playlist")
            .await?;
        let created: PlaylistItem = response.json().await?;
        log::info!("Created playlist '{}' ({})", created.name, created.id);
        Ok(created.id)
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        if track_ids.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        let uris: Vec<String> = track_ids.iter().map(|id| track_uri(id)).collect();
        let body = serde_json::json!({ "uris": uris });
        self.send(self.client.post(url).json(&body), "add-tracks")
            .await?;
        Ok(())
    }

    async fn list_playlists(&self, owner: &str) -> Result<Vec<PlaylistSummary>> {
        let mut url = self.endpoint(&["users", owner, "playlists"])?;
        url.query_pairs_mut()
            .append_pair("limit", PLAYLIST_PAGE_LIMIT);

        let mut playlists = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let page: Page<PlaylistItem> = self.get_json(page_url, "list-playlists").await?;
            playlists.extend(page.items.into_iter().map(|p| PlaylistSummary {
                id: p.id,
                name: p.name,
            }));
            next = page.next.as_deref().map(Url::parse).transpose()?;
        }
        Ok(playlists)
    }

    async fn clear_playlist(&self, playlist_id: &str) -> Result<()> {
        let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        let body = serde_json::json!({ "uris": Vec::<String>::new() });
        self.send(self.client.put(url).json(&body), "clear-playlist")
            .await?;
        Ok(())
    }
}

/// Catalog track URI for an id; full URIs pass through.
fn track_uri(id: &str) -> String {
    if id.starts_with("spotify:") {
        id.to_string()
    } else {
        format!("spotify:track:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> HttpCatalog {
        let credentials = CatalogCredentials {
            username: "owner".into(),
            access_token: "token".into(),
        };
        HttpCatalog::new(&CatalogConfig::default(), &credentials).unwrap()
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let url = catalog().endpoint(&["users", "dj name", "playlists"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.spotify.com/v1/users/dj%20name/playlists"
        );
    }

    #[test]
    fn test_pick_artist_prefers_exact_match() {
        let items = vec![
            ArtistItem {
                id: "1".into(),
                name: "The Band A Tribute".into(),
            },
            ArtistItem {
                id: "2".into(),
                name: "band a".into(),
            },
        ];
        assert_eq!(pick_artist("Band A", items), Some("2".to_string()));
    }

    #[test]
    fn test_pick_artist_falls_back_to_first() {
        let items = vec![ArtistItem {
            id: "9".into(),
            name: "Something Else".into(),
        }];
        assert_eq!(pick_artist("Band A", items), Some("9".to_string()));
        assert_eq!(pick_artist("Band A", Vec::new()), None);
    }

    #[test]
    fn test_search_response_parses() {
        let body = r#"{"artists":{"items":[{"id":"abc","name":"Band A","popularity":3}],"next":null}}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.artists.items[0].id, "abc");
    }

    #[test]
    fn test_track_uri() {
        assert_eq!(track_uri("abc"), "spotify:track:abc");
        assert_eq!(track_uri("spotify:track:abc"), "spotify:track:abc");
    }
}
