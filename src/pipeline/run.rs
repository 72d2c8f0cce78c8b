// src/pipeline/run.rs

//! Run orchestration.
//!
//! `run_etl` is the pure part: markup in, gated tables and indexes out.
//! `run_pipeline` wraps it with fetch, publish, catalog resolution and the
//! playlist sync, in that order. Nothing touches the playlist until every
//! earlier stage has succeeded.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Offset, TimeDelta, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{ArtistIndex, Config, Dataset, Event, Resolution, is_sentinel};
use crate::pipeline::{GateTables, build_indexes, fingerprint, flatten};
use crate::services::{
    CatalogClient, CatalogResolver, EventExtractor, PageFetcher, PlaylistSync, SyncSummary,
};
use crate::storage::{PublishReceipt, RecordSink};

/// Everything one ETL pass derives from a listing page.
#[derive(Debug, Clone)]
pub struct EtlOutput {
    pub events: Vec<Event>,
    pub index: ArtistIndex,
    pub dataset: Dataset,
}

impl EtlOutput {
    /// Artists to resolve in the catalog: the artist dimension in key order,
    /// minus the placeholder act, optionally only those with a show after
    /// the reference time.
    pub fn catalog_input(&self, sentinel: &str, upcoming_only: bool) -> Vec<&str> {
        let upcoming: HashSet<u64> = self
            .dataset
            .upcoming
            .iter()
            .map(|c| c.source_row_id)
            .collect();
        let touring: HashSet<&str> = self
            .dataset
            .staging
            .iter()
            .filter(|row| upcoming.contains(&row.source_row_id))
            .map(|row| row.artist.as_str())
            .collect();

        self.dataset
            .artists
            .iter()
            .map(|a| a.artist.as_str())
            .filter(|name| !is_sentinel(name, sentinel))
            .filter(|name| !upcoming_only || touring.contains(name))
            .collect()
    }
}

/// Extract, flatten, gate and index one listing page.
///
/// `reference` is venue-local wall-clock time; it anchors year inference
/// and the upcoming cut-off. The same inputs always give the same output.
pub fn run_etl(markup: &str, reference: NaiveDateTime, config: &Config) -> Result<EtlOutput> {
    let events = EventExtractor::new(reference.date()).extract(markup)?;
    let staging = flatten(&events);
    let tables = GateTables::derive(&staging, config.gate.show_key_scheme, reference)?;
    let index = build_indexes(&events, &config.extract.sentinel_artist);

    log::info!(
        "ETL: {} staging, {} artists, {} concerts ({} upcoming, {} rejected)",
        staging.len(),
        tables.artists.len(),
        tables.concerts.len(),
        tables.upcoming.len(),
        tables.rejected.len()
    );

    let dataset = Dataset {
        run_at: to_instant(reference, config),
        fingerprint: fingerprint(&staging),
        staging,
        artists: tables.artists,
        concerts: tables.concerts,
        upcoming: tables.upcoming,
        rejected: tables.rejected,
    };

    Ok(EtlOutput {
        events,
        index,
        dataset,
    })
}

/// Venue-local wall clock back to an instant.
fn to_instant(reference: NaiveDateTime, config: &Config) -> DateTime<Utc> {
    let offset = config.extract.venue_offset().unwrap_or_else(|| Utc.fix());
    (reference - TimeDelta::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Catalog side of a run: client plus playlist owner.
pub struct CatalogTarget<'a> {
    pub client: &'a dyn CatalogClient,
    pub owner: String,
}

/// Collaborators for one pipeline run.
pub struct PipelineContext<'a> {
    pub config: &'a Config,
    pub fetcher: &'a dyn PageFetcher,
    pub sink: &'a dyn RecordSink,
    /// Absent for ETL-only runs
    pub catalog: Option<CatalogTarget<'a>>,
}

/// Pipeline stage, for reporting where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Etl,
    Publish,
    Resolve,
    Sync,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Etl => "etl",
            Stage::Publish => "publish",
            Stage::Resolve => "resolve",
            Stage::Sync => "sync",
        };
        f.write_str(name)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_at: DateTime<Utc>,
    pub reference: NaiveDateTime,
    pub event_count: usize,
    pub staging_rows: usize,
    pub artists: usize,
    pub concerts: usize,
    pub upcoming: usize,
    pub rejected: usize,
    pub receipt: PublishReceipt,
    pub resolution: Option<Resolution>,
    pub sync: Option<SyncSummary>,
    pub index: ArtistIndex,
}

fn at_stage<T>(stage: Stage, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| log::error!("Run stopped at {} stage: {}", stage, e))
}

/// Fetch, transform, publish and sync.
pub async fn run_pipeline(ctx: &PipelineContext<'_>, now: DateTime<Utc>) -> Result<RunReport> {
    let config = ctx.config;
    let reference = config.extract.local_time(now);
    log::info!("Pipeline run at {} (venue time {})", now, reference);

    let bytes = at_stage(Stage::Fetch, ctx.fetcher.fetch(&config.fetch.url).await)?;
    let markup = String::from_utf8_lossy(&bytes);
    log::info!("Fetched {} bytes from {}", bytes.len(), config.fetch.url);

    let mut etl = at_stage(Stage::Etl, run_etl(&markup, reference, config))?;
    etl.dataset.run_at = now;

    let receipt = at_stage(Stage::Publish, ctx.sink.publish(&etl.dataset).await)?;

    let (resolution, sync) = match &ctx.catalog {
        Some(target) => {
            let input = etl.catalog_input(
                &config.extract.sentinel_artist,
                config.playlist.upcoming_only,
            );
            let resolver =
                CatalogResolver::new(target.client, &config.catalog, config.playlist.tracks_per_artist);
            let resolution = at_stage(Stage::Resolve, resolver.resolve(&input).await)?;
            etl.index.enrich(reference, resolution.resolved_names());

            let payload = resolution.track_payload();
            let playlist = PlaylistSync::new(
                target.client,
                target.owner.clone(),
                &config.playlist,
                config.catalog.retry_policy(),
            );
            let sync = at_stage(Stage::Sync, playlist.sync(&payload).await)?;
            (Some(resolution), Some(sync))
        }
        None => {
            etl.index.enrich(reference, std::iter::empty());
            (None, None)
        }
    };

    let dataset = &etl.dataset;
    Ok(RunReport {
        run_at: now,
        reference,
        event_count: etl.events.len(),
        staging_rows: dataset.staging.len(),
        artists: dataset.artists.len(),
        concerts: dataset.concerts.len(),
        upcoming: dataset.upcoming.len(),
        rejected: dataset.rejected.len(),
        receipt,
        resolution,
        sync,
        index: etl.index,
    })
}
