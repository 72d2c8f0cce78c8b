//! Pipeline stages and orchestration.
//!
//! - `staging`: flatten events into one row per artist appearance
//! - `gate`: artist dimension, concert facts and upcoming shows
//! - `index`: artist/date lookups
//! - `circuit_breaker` and `diff`: publish safety and roster changes
//! - `run`: `run_etl` and `run_pipeline`

pub mod circuit_breaker;
pub mod diff;
pub mod gate;
pub mod index;
pub mod run;
pub mod staging;

pub use circuit_breaker::{CircuitBreaker, ListingSize};
pub use diff::{RosterDiff, calculate_diff};
pub use gate::{
    ConcertDerivation, GateTables, derive_artists, derive_concerts, derive_upcoming, show_key,
};
pub use index::build_indexes;
pub use run::{
    CatalogTarget, EtlOutput, PipelineContext, RunReport, Stage, run_etl, run_pipeline,
};
pub use staging::{fingerprint, flatten};
