//! Ingestion Progress Events
//!
//! Events broadcast by the pipeline while a batch run executes. Granularity
//! is one event per task transition; nothing is emitted mid-task.

use serde::{Deserialize, Serialize};

use crate::core::{RecordId, RunId, TaskId};

use super::BatchSummary;

/// Progress event for a batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IngestEvent {
    /// A run started with `total` scheduled tasks
    RunStarted { run_id: RunId, total: usize },
    /// Task `index` (0-based) began executing
    TaskStarted {
        run_id: RunId,
        task_id: TaskId,
        index: usize,
        total: usize,
    },
    /// Task finished and its record is cataloged
    TaskCompleted {
        run_id: RunId,
        task_id: TaskId,
        index: usize,
        record_id: RecordId,
    },
    /// Task failed; the run continues with the next one
    TaskFailed {
        run_id: RunId,
        task_id: TaskId,
        index: usize,
        error: String,
    },
    /// The cancel token fired between tasks; `remaining` tasks never ran
    RunCancelled {
        run_id: RunId,
        completed: usize,
        remaining: usize,
    },
    /// The run is over (also emitted after cancellation)
    RunFinished { run_id: RunId, summary: BatchSummary },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = IngestEvent::TaskCompleted {
            run_id: "run-1".to_string(),
            task_id: "task-1".to_string(),
            index: 0,
            record_id: "rec-1".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "taskCompleted");
        assert_eq!(json["runId"], "run-1");
        assert_eq!(json["recordId"], "rec-1");
    }

    #[test]
    fn run_finished_carries_summary() {
        let event = IngestEvent::RunFinished {
            run_id: "run-1".to_string(),
            summary: BatchSummary {
                total: 3,
                succeeded: 2,
                failed: 1,
                skipped: 0,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "runFinished");
        assert_eq!(json["summary"]["succeeded"], 2);
    }
}
