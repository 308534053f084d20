//! Staging Session Module
//!
//! Manages photos, stacks, and the staging session that holds a batch
//! between clustering and ingestion, including all stack editing operations.

pub mod editor;
pub mod models;

pub use models::{Photo, Stack, StagingSession};
