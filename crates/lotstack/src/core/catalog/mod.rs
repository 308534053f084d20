//! Catalog Module
//!
//! Manages catalog records - the durable output of ingestion - and
//! change notifications for record listings.

pub mod models;
pub mod sqlite;
pub mod store;

pub use models::{CatalogChange, CatalogRecord, ItemMetadata, RecordPatch, RecordStatus};
pub use sqlite::SqliteRecordStore;
pub use store::{MemoryRecordStore, RecordStore};
