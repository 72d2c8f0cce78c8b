//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── current.json          # Latest dataset
//! └── runs/
//!     └── YYYYMMDDTHHMMSS.json
//! ```
//!
//! Writes go to a temp file and are renamed into place, so readers never
//! observe a partial dataset. The snapshot is written before `current.json`;
//! a crash between the two leaves the previous current dataset in effect.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Dataset, StorageConfig};
use crate::pipeline::{CircuitBreaker, ListingSize, calculate_diff};
use crate::storage::{PublishReceipt, RecordSink};

const CURRENT_KEY: &str = "current.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    circuit_breaker: Option<CircuitBreaker>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory, with the
    /// default circuit breaker.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            circuit_breaker: Some(CircuitBreaker::default()),
        }
    }

    /// Create a LocalStorage from the `[storage]` config section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            root_dir: PathBuf::from(&config.dir),
            circuit_breaker: config
                .circuit_breaker
                .then(|| CircuitBreaker::from(config)),
        }
    }

    /// Create a LocalStorage with a custom (or no) circuit breaker.
    pub fn with_circuit_breaker(
        root_dir: impl Into<PathBuf>,
        circuit_breaker: Option<CircuitBreaker>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            circuit_breaker,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Snapshot key for a run.
    fn run_key(dataset: &Dataset) -> String {
        format!("runs/{}.json", dataset.run_at.format("%Y%m%dT%H%M%S"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordSink for LocalStorage {
    async fn publish(&self, dataset: &Dataset) -> Result<PublishReceipt> {
        let previous = self.load_current().await?;
        let previous_rows = previous.as_ref().map(|p| p.staging.len());
        let diff = calculate_diff(previous.as_ref(), dataset);

        if let Some(prev) = previous.as_ref().filter(|p| p.same_tables(dataset)) {
            log::info!(
                "Dataset unchanged since {} ({}); skipping write",
                prev.run_at,
                &dataset.fingerprint[..dataset.fingerprint.len().min(12)]
            );
            return Ok(PublishReceipt {
                location: CURRENT_KEY.to_string(),
                run_at: prev.run_at,
                unchanged: true,
                staging_rows: dataset.staging.len(),
                previous_rows,
                diff,
            });
        }

        if let Some(breaker) = &self.circuit_breaker {
            breaker.guard(previous.as_ref().map(ListingSize::of), ListingSize::of(dataset))?;
        }

        if diff.has_changes() {
            log::info!(
                "Roster diff: {} added, {} removed",
                diff.added.len(),
                diff.removed.len()
            );
        }

        let key = Self::run_key(dataset);
        self.write_json(&key, dataset).await?;
        self.write_json(CURRENT_KEY, dataset).await?;
        log::info!(
            "Published {} staging rows, {} artists, {} concerts to {}",
            dataset.staging.len(),
            dataset.artists.len(),
            dataset.concerts.len(),
            self.path(&key).display()
        );

        Ok(PublishReceipt {
            location: key,
            run_at: dataset.run_at,
            unchanged: false,
            staging_rows: dataset.staging.len(),
            previous_rows,
            diff,
        })
    }

    async fn load_current(&self) -> Result<Option<Dataset>> {
        let current = self.read_json(CURRENT_KEY).await?;
        if current.is_none() {
            log::warn!("No {} found in {}", CURRENT_KEY, self.root_dir.display());
        }
        Ok(current)
    }
}
