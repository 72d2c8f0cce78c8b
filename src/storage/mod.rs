//! Storage abstractions for published datasets.
//!
//! Every run publishes one [`Dataset`] as a unit. The latest dataset is the
//! baseline for the next run's circuit breaker and roster diff.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── current.json              # Latest published dataset
//! └── runs/                     # One immutable snapshot per publish
//!     ├── 20250303T120000.json
//!     └── 20250304T120000.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::Dataset;
use crate::pipeline::RosterDiff;

pub use local::LocalStorage;

/// What a publish did.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    /// Snapshot key written, or the current key for an unchanged dataset
    pub location: String,

    pub run_at: DateTime<Utc>,

    /// True when the dataset matched the current fingerprint and nothing was written
    pub unchanged: bool,

    pub staging_rows: usize,

    /// Staging rows in the previous dataset, if any
    pub previous_rows: Option<usize>,

    pub diff: RosterDiff,
}

/// Sink for gated record sets.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist a dataset atomically, or fail leaving the previous one intact.
    async fn publish(&self, dataset: &Dataset) -> Result<PublishReceipt>;

    /// The most recently published dataset.
    async fn load_current(&self) -> Result<Option<Dataset>>;
}
