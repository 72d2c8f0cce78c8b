//! Publish guard for collapsed listings.
//!
//! A listing page that changed shape usually still parses, just into far
//! fewer rows or into the same few artists repeated. Before a dataset
//! replaces the published one, its staging row count and its distinct
//! artist count are both compared against the previous run.

use crate::error::{AppError, Result};
use crate::models::{Dataset, StorageConfig};

/// The two sizes the guard watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSize {
    pub rows: usize,
    pub artists: usize,
}

impl ListingSize {
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            rows: dataset.staging.len(),
            artists: dataset.artists.len(),
        }
    }
}

/// Refuses a publish whose listing shrank by more than `max_drop_percent`.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_drop_percent: u8,
    /// Previous listings with fewer rows are too small to judge
    min_baseline: usize,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(50, 10)
    }
}

impl From<&StorageConfig> for CircuitBreaker {
    fn from(config: &StorageConfig) -> Self {
        Self::new(config.max_drop_percent, config.min_baseline)
    }
}

/// Percentage lost going from `before` to `after`; growth counts as zero.
fn shrinkage(before: usize, after: usize) -> f64 {
    if before == 0 || after >= before {
        return 0.0;
    }
    (before - after) as f64 * 100.0 / before as f64
}

impl CircuitBreaker {
    pub fn new(max_drop_percent: u8, min_baseline: usize) -> Self {
        Self {
            max_drop_percent: max_drop_percent.min(100),
            min_baseline,
        }
    }

    /// Ok when `next` may replace `previous`. `None` means nothing is
    /// published yet, which always passes.
    pub fn guard(&self, previous: Option<ListingSize>, next: ListingSize) -> Result<()> {
        let Some(previous) = previous else {
            log::info!("First publish: {} rows, {} artists", next.rows, next.artists);
            return Ok(());
        };

        if next.rows == 0 {
            if previous.rows == 0 {
                return Ok(());
            }
            log::error!(
                "Refusing to replace {} published rows with an empty listing",
                previous.rows
            );
            return Err(AppError::EmptyListing);
        }

        if previous.rows < self.min_baseline {
            log::debug!(
                "Previous listing has {} rows (< {}); skipping drop check",
                previous.rows,
                self.min_baseline
            );
            return Ok(());
        }

        let threshold = f64::from(self.max_drop_percent);
        for (measure, before, after) in [
            ("rows", previous.rows, next.rows),
            ("artists", previous.artists, next.artists),
        ] {
            let drop_percent = shrinkage(before, after);
            if drop_percent > threshold {
                log::error!(
                    "Listing collapsed: {} {} -> {} ({:.1}% drop, limit {}%)",
                    measure,
                    before,
                    after,
                    drop_percent,
                    self.max_drop_percent
                );
                return Err(AppError::CircuitBreakerTriggered {
                    measure,
                    current_count: after,
                    previous_count: before,
                    drop_percent,
                    threshold_percent: self.max_drop_percent,
                });
            }
        }

        log::info!(
            "Listing size ok: {} rows (was {}), {} artists (was {})",
            next.rows,
            previous.rows,
            next.artists,
            previous.artists
        );
        Ok(())
    }
}
