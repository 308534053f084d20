//! LotStack Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::{RecordId, StackId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Staging Errors
    // =========================================================================
    #[error("Stack not found: {0}")]
    StackNotFound(StackId),

    #[error("Photo index {index} out of range for stack {stack_id} (len {len})")]
    PhotoIndexOutOfRange {
        stack_id: StackId,
        index: usize,
        len: usize,
    },

    #[error("Merge requires at least two stacks, got {0}")]
    MergeSelectionTooSmall(usize),

    #[error("Stack not splittable: {0} has fewer than two photos")]
    StackNotSplittable(StackId),

    #[error("Invalid stack position: {0}")]
    InvalidStackPosition(usize),

    // =========================================================================
    // Upload Errors
    // =========================================================================
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload timed out after {0} seconds")]
    UploadTimeout(u64),

    // =========================================================================
    // Analysis Errors
    // =========================================================================
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Analysis timed out after {0} seconds")]
    AnalysisTimeout(u64),

    #[error("Analysis request contains no images")]
    AnalysisNoImages,

    // =========================================================================
    // Catalog Errors
    // =========================================================================
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Record store operation failed: {0}")]
    RecordStoreFailed(String),

    // =========================================================================
    // Ingestion Errors
    // =========================================================================
    #[error("Batch contains no stacks")]
    EmptyBatch,

    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;
