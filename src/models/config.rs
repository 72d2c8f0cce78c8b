//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::retry::RetryPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing page and HTTP behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Extraction settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Gate transformation settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Streaming catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Target playlist settings
    #[serde(default)]
    pub playlist: PlaylistConfig,

    /// Local record sink settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.fetch.url)?;
        url::Url::parse(&self.catalog.api_base)?;
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.backoff_base_ms > self.fetch.backoff_max_ms {
            return Err(AppError::validation(
                "fetch.backoff_base_ms must not exceed fetch.backoff_max_ms",
            ));
        }
        if self.catalog.backoff_base_ms > self.catalog.backoff_max_ms {
            return Err(AppError::validation(
                "catalog.backoff_base_ms must not exceed catalog.backoff_max_ms",
            ));
        }
        if self.extract.venue_offset().is_none() {
            return Err(AppError::validation(
                "extract.utc_offset_minutes must be within +/- 24h",
            ));
        }
        if self.extract.sentinel_artist.trim().is_empty() {
            return Err(AppError::validation("extract.sentinel_artist is empty"));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(AppError::validation("catalog.timeout_secs must be > 0"));
        }
        if self.catalog.max_concurrent == 0 {
            return Err(AppError::validation("catalog.max_concurrent must be > 0"));
        }
        if self.playlist.name.trim().is_empty() {
            return Err(AppError::validation("playlist.name is empty"));
        }
        if self.playlist.tracks_per_artist == 0 {
            return Err(AppError::validation(
                "playlist.tracks_per_artist must be > 0",
            ));
        }
        if self.playlist.add_batch_size == 0 || self.playlist.add_batch_size > 100 {
            return Err(AppError::validation(
                "playlist.add_batch_size must be within 1..=100",
            ));
        }
        if self.storage.max_drop_percent > 100 {
            return Err(AppError::validation(
                "storage.max_drop_percent must be within 0..=100",
            ));
        }
        Ok(())
    }
}

/// Listing page and HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Listing page URL
    #[serde(default = "defaults::listing_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: defaults::listing_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Venue-local offset from UTC in minutes, used for "now"
    #[serde(default = "defaults::utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Placeholder artist name for unbooked slots (case-insensitive)
    #[serde(default = "defaults::sentinel_artist")]
    pub sentinel_artist: String,
}

impl ExtractConfig {
    /// Venue-local UTC offset.
    pub fn venue_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// Convert an instant to venue-local wall-clock time.
    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self.venue_offset() {
            Some(offset) => instant.with_timezone(&offset).naive_local(),
            None => instant.naive_utc(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: defaults::utc_offset_minutes(),
            sentinel_artist: defaults::sentinel_artist(),
        }
    }
}

/// How concert surrogate keys are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowKeyScheme {
    /// Content hash of (source_row_id, show_date)
    #[default]
    Hashed,
    /// Row id concatenated with day-of-month; may collide
    Legacy,
}

/// Gate transformation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub show_key_scheme: ShowKeyScheme,
}

/// Streaming catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Web API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Market used for top-track lookups
    #[serde(default = "defaults::market")]
    pub market: String,

    /// Per-call timeout in seconds
    #[serde(default = "defaults::catalog_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent artist lookups
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Retries for a rate-limited or timed-out catalog call
    #[serde(default = "defaults::max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// First backoff delay in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,
}

impl CatalogConfig {
    /// Backoff shared by artist lookups and playlist mutations.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_rate_limit_retries,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            market: defaults::market(),
            timeout_secs: defaults::catalog_timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_rate_limit_retries: defaults::max_rate_limit_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
        }
    }
}

/// Target playlist settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Playlist display name, matched exactly
    #[serde(default = "defaults::playlist_name")]
    pub name: String,

    /// Top tracks taken per artist
    #[serde(default = "defaults::tracks_per_artist")]
    pub tracks_per_artist: usize,

    /// Only include artists with a show after "now"
    #[serde(default)]
    pub upcoming_only: bool,

    /// Tracks per add request
    #[serde(default = "defaults::add_batch_size")]
    pub add_batch_size: usize,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            name: defaults::playlist_name(),
            tracks_per_artist: defaults::tracks_per_artist(),
            upcoming_only: false,
            add_batch_size: defaults::add_batch_size(),
        }
    }
}

/// Local record sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for datasets
    #[serde(default = "defaults::storage_dir")]
    pub dir: String,

    /// Refuse to publish a listing that collapsed since the last run
    #[serde(default = "defaults::enabled")]
    pub circuit_breaker: bool,

    /// Maximum allowed drop in staging rows, percent
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous row count below which the drop check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
            circuit_breaker: defaults::enabled(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Catalog credentials, loaded once by the application.
#[derive(Debug, Clone)]
pub struct CatalogCredentials {
    /// Playlist owner
    pub username: String,
    /// Bearer token for the catalog Web API
    pub access_token: String,
}

impl CatalogCredentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        let username = env_any(&["TOURLIST_USERNAME", "SPOTIPY_USERNAME"])
            .ok_or_else(|| AppError::config("TOURLIST_USERNAME is not set"))?;
        let access_token = env_any(&["TOURLIST_ACCESS_TOKEN"])
            .ok_or_else(|| AppError::auth("TOURLIST_ACCESS_TOKEN is not set"))?;
        Ok(Self {
            username,
            access_token,
        })
    }
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

mod defaults {
    // Fetch defaults
    pub fn listing_url() -> String {
        "http://www.flagpole.com/events/live-music".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tourlist/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        500
    }
    pub fn backoff_max() -> u64 {
        8_000
    }

    // Extract defaults
    pub fn utc_offset_minutes() -> i32 {
        -300
    }
    pub fn sentinel_artist() -> String {
        "open mic".into()
    }

    // Catalog defaults
    pub fn api_base() -> String {
        "https://api.spotify.com/v1".into()
    }
    pub fn market() -> String {
        "US".into()
    }
    pub fn catalog_timeout() -> u64 {
        15
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_rate_limit_retries() -> u32 {
        3
    }

    // Playlist defaults
    pub fn playlist_name() -> String {
        "Touring Artists".into()
    }
    pub fn tracks_per_artist() -> usize {
        10
    }
    pub fn add_batch_size() -> usize {
        100
    }

    // Storage defaults
    pub fn storage_dir() -> String {
        "storage".into()
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        10
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
