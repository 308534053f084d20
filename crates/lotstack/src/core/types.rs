//! LotStack Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

// =============================================================================
// ID Types
// =============================================================================

/// Photo unique identifier (ULID)
pub type PhotoId = String;

/// Stack unique identifier (ULID)
pub type StackId = String;

/// Staging session unique identifier (ULID)
pub type SessionId = String;

/// Catalog record unique identifier (ULID)
pub type RecordId = String;

/// Uploaded asset unique identifier (ULID)
pub type AssetId = String;

/// Ingestion task unique identifier (ULID)
pub type TaskId = String;

/// Batch run unique identifier (ULID)
pub type RunId = String;

/// Record owner identifier (opaque, caller-supplied)
pub type OwnerId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Capture timestamp in milliseconds since the Unix epoch
pub type TimestampMs = i64;
