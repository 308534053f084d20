//! Batch Ingestion Module
//!
//! Turns staged photo stacks into durable catalog records: create a
//! placeholder record, upload the stack's photos as assets, optionally run
//! vision analysis, then finalize the record.

mod events;
mod pipeline;

pub use events::*;
pub use pipeline::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::catalog::ItemMetadata;
use crate::core::staging::Stack;
use crate::core::storage::AssetRef;
use crate::core::{OwnerId, RecordId, RunId, TaskId};

// =============================================================================
// Task State
// =============================================================================

/// Lifecycle state of one ingestion task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Scheduled but not started
    #[default]
    Pending,
    /// Creating (or resetting) the placeholder catalog record
    CreatingRecord,
    /// Uploading the stack's photos in order
    UploadingAssets,
    /// Vision analysis in flight
    Analyzing,
    /// Writing assets and metadata back to the record
    Finalizing,
    /// Task finished and the record is cataloged
    Completed,
    /// Task aborted; the placeholder record is marked failed
    Failed,
}

impl TaskState {
    /// Checks if the task has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

// =============================================================================
// Ingestion Task
// =============================================================================

/// One unit of batch work: a stack on its way to becoming a catalog record
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionTask {
    /// Task ID
    pub id: TaskId,
    /// The stack being ingested (photo 0 is the hero)
    pub stack: Stack,
    /// Current lifecycle state
    pub state: TaskState,
    /// Record ID once the placeholder exists
    pub record_id: Option<RecordId>,
    /// Uploaded asset references in stack order
    pub assets: Vec<AssetRef>,
    /// Metadata to be written at finalize (known fields + analysis output)
    #[serde(default)]
    pub metadata: ItemMetadata,
    /// Non-fatal problems encountered along the way
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Failure message when state is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC3339 timestamp when the task started
    pub started_at: Option<String>,
    /// RFC3339 timestamp when the task reached a terminal state
    pub finished_at: Option<String>,
}

impl IngestionTask {
    /// Creates a pending task for a stack
    pub fn new(stack: Stack) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            stack,
            state: TaskState::Pending,
            record_id: None,
            assets: Vec::new(),
            metadata: ItemMetadata::default(),
            warnings: Vec::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Creates a pending task that reuses an existing placeholder record.
    ///
    /// Used when retrying a failed task: record creation is skipped and the
    /// prior record is reset instead.
    pub fn for_retry(stack: Stack, record_id: &str) -> Self {
        let mut task = Self::new(stack);
        task.record_id = Some(record_id.to_string());
        task
    }

    /// Checks if the task has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Marks the task failed with a reason
    pub(crate) fn fail(&mut self, error: &str) {
        self.state = TaskState::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Marks the task completed
    pub(crate) fn complete(&mut self) {
        self.state = TaskState::Completed;
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

// =============================================================================
// Batch Run
// =============================================================================

/// Final tallies for a batch run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Tasks scheduled
    pub total: usize,
    /// Tasks that completed
    pub succeeded: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks never started (run cancelled before they ran)
    pub skipped: usize,
}

/// A batch of ingestion tasks driven to completion by the pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    /// Run ID
    pub id: RunId,
    /// Owner the records belong to
    pub owner_id: OwnerId,
    /// Scheduled tasks in execution order
    pub tasks: Vec<IngestionTask>,
    /// True when the run stopped early via the cancel token
    pub cancelled: bool,
    /// RFC3339 timestamp when the run started
    pub started_at: String,
    /// RFC3339 timestamp when the run finished
    pub finished_at: Option<String>,
}

impl BatchRun {
    /// Creates a run over a set of pending tasks
    pub(crate) fn new(owner_id: &str, tasks: Vec<IngestionTask>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            owner_id: owner_id.to_string(),
            tasks,
            cancelled: false,
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
        }
    }

    /// Tallies task outcomes. Non-terminal tasks count as skipped.
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.tasks.len(),
            ..Default::default()
        };
        for task in &self.tasks {
            match task.state {
                TaskState::Completed => summary.succeeded += 1,
                TaskState::Failed => summary.failed += 1,
                _ => summary.skipped += 1,
            }
        }
        summary
    }

    /// Returns the tasks that failed, in execution order
    pub fn failed_tasks(&self) -> Vec<&IngestionTask> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .collect()
    }
}

// =============================================================================
// Ingest Options
// =============================================================================

/// Per-run ingestion options
#[derive(Clone, Debug)]
pub struct IngestOptions {
    /// Owner the created records belong to
    pub owner_id: OwnerId,
    /// Run vision analysis after upload (default true)
    pub analyze: bool,
    /// Free-text operator notes, stored on the record and fed to analysis
    pub context_notes: String,
    /// Fields the operator already knows; analysis only fills the gaps
    pub known_fields: ItemMetadata,
}

impl IngestOptions {
    /// Creates options for an owner with analysis enabled
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            analyze: true,
            context_notes: String::new(),
            known_fields: ItemMetadata::default(),
        }
    }

    /// Disables the analysis step
    pub fn without_analysis(mut self) -> Self {
        self.analyze = false;
        self
    }

    /// Sets operator notes
    pub fn with_context_notes(mut self, notes: &str) -> Self {
        self.context_notes = notes.to_string();
        self
    }

    /// Sets fields the operator already knows
    pub fn with_known_fields(mut self, fields: ItemMetadata) -> Self {
        self.known_fields = fields;
        self
    }
}

// =============================================================================
// Ingest Configuration
// =============================================================================

/// Pipeline timeout configuration
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Per-photo upload timeout; exceeding it fails the task
    pub upload_timeout: Duration,
    /// Analysis timeout; exceeding it only records a warning
    pub analysis_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_timeout: Duration::from_secs(60),
            analysis_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::staging::Photo;

    fn stack_of(count: usize) -> Stack {
        let photos = (0..count)
            .map(|i| Photo::new(i as i64 * 1_000, vec![i as u8]))
            .collect();
        Stack::from_photos(photos).unwrap()
    }

    #[test]
    fn test_task_creation() {
        let task = IngestionTask::new(stack_of(2));

        assert!(!task.id.is_empty());
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.record_id.is_none());
        assert!(task.assets.is_empty());
        assert!(!task.is_terminal());
    }

    #[test]
    fn test_retry_task_carries_record_id() {
        let task = IngestionTask::for_retry(stack_of(1), "rec-1");

        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.record_id.as_deref(), Some("rec-1"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Analyzing.is_terminal());

        let mut task = IngestionTask::new(stack_of(1));
        task.fail("upload failed");
        assert!(task.is_terminal());
        assert_eq!(task.error.as_deref(), Some("upload failed"));
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn test_run_summary_counts_by_state() {
        let mut tasks: Vec<IngestionTask> = (0..4).map(|_| IngestionTask::new(stack_of(1))).collect();
        tasks[0].complete();
        tasks[1].fail("boom");
        tasks[2].complete();
        // tasks[3] stays pending

        let run = BatchRun::new("owner-1", tasks);
        let summary = run.summary();

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(run.failed_tasks().len(), 1);
    }

    #[test]
    fn test_options_builder() {
        let options = IngestOptions::new("owner-1")
            .without_analysis()
            .with_context_notes("garage shelf");

        assert_eq!(options.owner_id, "owner-1");
        assert!(!options.analyze);
        assert_eq!(options.context_notes, "garage shelf");
        assert!(options.known_fields.is_empty());
    }

    #[test]
    fn test_task_state_serializes_camel_case() {
        let json = serde_json::to_string(&TaskState::UploadingAssets).unwrap();
        assert_eq!(json, "\"uploadingAssets\"");
    }
}
