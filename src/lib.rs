// src/lib.rs

//! Tourlist: concert listing ETL and touring-artist playlist sync.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
