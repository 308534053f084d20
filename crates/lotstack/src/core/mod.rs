//! LotStack Core Engine
//!
//! Core staging and ingestion module.
//! Handles clustering, stack editing, catalog records, asset storage,
//! vision analysis, and the batch ingestion pipeline.

pub mod analysis;
pub mod catalog;
pub mod clustering;
pub mod fs;
pub mod ingest;
pub mod settings;
pub mod staging;
pub mod storage;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
