//! Ingestion Pipeline
//!
//! Drives a batch run against the storage, record-store, and analysis
//! adapters. One logical worker executes tasks strictly in order, checks the
//! cancel token between tasks, and broadcasts progress events.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::analysis::{AnalysisAdapter, AnalysisRequest};
use crate::core::catalog::{RecordPatch, RecordStatus, RecordStore};
use crate::core::staging::Stack;
use crate::core::storage::StorageAdapter;
use crate::core::{CoreError, CoreResult};

use super::{BatchRun, IngestConfig, IngestEvent, IngestOptions, IngestionTask, TaskState};

/// Progress channel capacity; slow subscribers lose the oldest events
const EVENT_CHANNEL_CAPACITY: usize = 128;

// =============================================================================
// Ingest Pipeline
// =============================================================================

/// Turns staged stacks into catalog records.
///
/// Per task: create (or reset) a placeholder record, upload the stack's
/// photos in order, optionally run vision analysis, then finalize the record.
/// Task failures never abort the run; the next task still executes.
pub struct IngestPipeline {
    storage: Arc<dyn StorageAdapter>,
    records: Arc<dyn RecordStore>,
    analysis: Option<Arc<dyn AnalysisAdapter>>,
    config: IngestConfig,
    event_tx: broadcast::Sender<IngestEvent>,
}

impl IngestPipeline {
    /// Creates a pipeline without an analysis adapter
    pub fn new(storage: Arc<dyn StorageAdapter>, records: Arc<dyn RecordStore>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            records,
            analysis: None,
            config: IngestConfig::default(),
            event_tx,
        }
    }

    /// Attaches a vision analysis adapter
    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisAdapter>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Overrides the timeout configuration
    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// Subscribes to progress events for subsequent runs
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: IngestEvent) {
        // A send error just means nobody is listening.
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // Run Entry Points
    // =========================================================================

    /// Runs a batch over the given stacks.
    ///
    /// Errors only on an empty batch; per-task failures are recorded on the
    /// returned run instead.
    pub async fn run(&self, stacks: Vec<Stack>, options: &IngestOptions) -> CoreResult<BatchRun> {
        self.run_with_cancel(stacks, options, CancellationToken::new())
            .await
    }

    /// Runs a batch, stopping between tasks once `cancel` fires.
    ///
    /// Cancellation is cooperative: the task in flight always finishes, tasks
    /// that never started stay `Pending`, and completed work is kept.
    pub async fn run_with_cancel(
        &self,
        stacks: Vec<Stack>,
        options: &IngestOptions,
        cancel: CancellationToken,
    ) -> CoreResult<BatchRun> {
        if stacks.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        let tasks = stacks.into_iter().map(IngestionTask::new).collect();
        Ok(self.drive(tasks, options, cancel).await)
    }

    /// Re-runs the failed tasks of a previous run.
    ///
    /// Each retried task keeps its placeholder record: creation is skipped
    /// and the record's failed status is reset instead. Errors when the run
    /// has no failed tasks.
    pub async fn retry_failed(
        &self,
        run: &BatchRun,
        options: &IngestOptions,
        cancel: CancellationToken,
    ) -> CoreResult<BatchRun> {
        let tasks: Vec<IngestionTask> = run
            .failed_tasks()
            .into_iter()
            .map(|task| match &task.record_id {
                Some(record_id) => IngestionTask::for_retry(task.stack.clone(), record_id),
                None => IngestionTask::new(task.stack.clone()),
            })
            .collect();
        if tasks.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        Ok(self.drive(tasks, options, cancel).await)
    }

    /// Ingests one stack, surfacing a task failure as an error
    pub async fn ingest_single(
        &self,
        stack: Stack,
        options: &IngestOptions,
    ) -> CoreResult<IngestionTask> {
        let run = self.run(vec![stack], options).await?;
        let task = run
            .tasks
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Internal("batch run lost its only task".to_string()))?;
        if task.state == TaskState::Failed {
            let reason = task
                .error
                .clone()
                .unwrap_or_else(|| "ingestion failed".to_string());
            return Err(CoreError::TaskFailed(reason));
        }
        Ok(task)
    }

    // =========================================================================
    // Run Loop
    // =========================================================================

    async fn drive(
        &self,
        tasks: Vec<IngestionTask>,
        options: &IngestOptions,
        cancel: CancellationToken,
    ) -> BatchRun {
        let mut run = BatchRun::new(&options.owner_id, tasks);
        let total = run.tasks.len();

        info!(run_id = %run.id, total, owner_id = %options.owner_id, "starting batch run");
        self.emit(IngestEvent::RunStarted {
            run_id: run.id.clone(),
            total,
        });

        for index in 0..total {
            // Cancellation is only honored between tasks; the task in
            // flight always runs to a terminal state.
            if cancel.is_cancelled() {
                run.cancelled = true;
                warn!(run_id = %run.id, completed = index, remaining = total - index, "batch run cancelled");
                self.emit(IngestEvent::RunCancelled {
                    run_id: run.id.clone(),
                    completed: index,
                    remaining: total - index,
                });
                break;
            }

            let task_id = run.tasks[index].id.clone();
            self.emit(IngestEvent::TaskStarted {
                run_id: run.id.clone(),
                task_id: task_id.clone(),
                index,
                total,
            });

            self.run_task(&mut run.tasks[index], options).await;

            match run.tasks[index].state {
                TaskState::Completed => {
                    let record_id = run.tasks[index].record_id.clone().unwrap_or_default();
                    self.emit(IngestEvent::TaskCompleted {
                        run_id: run.id.clone(),
                        task_id,
                        index,
                        record_id,
                    });
                }
                TaskState::Failed => {
                    let error = run.tasks[index].error.clone().unwrap_or_default();
                    self.emit(IngestEvent::TaskFailed {
                        run_id: run.id.clone(),
                        task_id,
                        index,
                        error,
                    });
                }
                state => {
                    error!(run_id = %run.id, task_id = %task_id, ?state, "task ended in a non-terminal state");
                }
            }
        }

        run.finished_at = Some(chrono::Utc::now().to_rfc3339());
        let summary = run.summary();
        info!(
            run_id = %run.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch run finished"
        );
        self.emit(IngestEvent::RunFinished {
            run_id: run.id.clone(),
            summary,
        });

        run
    }

    /// Drives one task to a terminal state. Never returns an error: every
    /// failure is captured on the task itself.
    async fn run_task(&self, task: &mut IngestionTask, options: &IngestOptions) {
        task.started_at = Some(chrono::Utc::now().to_rfc3339());
        task.state = TaskState::CreatingRecord;

        let record_id = match task.record_id.clone() {
            // Retry path: the placeholder already exists, wipe its failure.
            Some(record_id) => {
                let reset = RecordPatch::default()
                    .with_status(RecordStatus::Undetermined)
                    .with_failure_reason(None);
                if let Err(err) = self.records.update(&record_id, reset).await {
                    task.fail(&format!("failed to reset record {record_id}: {err}"));
                    return;
                }
                record_id
            }
            None => match self.records.create(&options.owner_id).await {
                Ok(record_id) => {
                    task.record_id = Some(record_id.clone());
                    record_id
                }
                Err(err) => {
                    task.fail(&format!("failed to create record: {err}"));
                    return;
                }
            },
        };

        // Upload in stack order so asset index 0 stays the hero.
        task.state = TaskState::UploadingAssets;
        for index in 0..task.stack.photos.len() {
            let upload = self.storage.upload(
                &task.stack.photos[index].bytes,
                &options.owner_id,
                &record_id,
                index,
            );
            let reason = match tokio::time::timeout(self.config.upload_timeout, upload).await {
                Ok(Ok(asset)) => {
                    task.assets.push(asset);
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => {
                    CoreError::UploadTimeout(self.config.upload_timeout.as_secs()).to_string()
                }
            };
            warn!(record_id = %record_id, index, reason = %reason, "upload failed, aborting task");
            self.mark_record_failed(&record_id, &reason).await;
            task.fail(&reason);
            return;
        }

        // Analysis is best-effort: any failure becomes a warning and the
        // record is still cataloged.
        task.metadata = options.known_fields.clone();
        let mut analyzed = false;
        if options.analyze {
            match &self.analysis {
                Some(adapter) => {
                    task.state = TaskState::Analyzing;
                    analyzed = true;
                    let image_bytes: Vec<Vec<u8>> =
                        task.stack.photos.iter().map(|p| p.bytes.clone()).collect();
                    let request = AnalysisRequest::new(image_bytes)
                        .with_assets(task.assets.clone())
                        .with_context_notes(&options.context_notes)
                        .with_known_fields(options.known_fields.clone());
                    match tokio::time::timeout(self.config.analysis_timeout, adapter.analyze(request))
                        .await
                    {
                        Ok(Ok(draft)) => task.metadata.merge_missing(draft),
                        Ok(Err(err)) => {
                            warn!(record_id = %record_id, error = %err, "analysis failed, cataloging without it");
                            task.warnings.push(format!("analysis failed: {err}"));
                        }
                        Err(_) => {
                            let reason =
                                CoreError::AnalysisTimeout(self.config.analysis_timeout.as_secs())
                                    .to_string();
                            warn!(record_id = %record_id, reason = %reason, "cataloging without analysis");
                            task.warnings.push(reason);
                        }
                    }
                }
                None => {
                    warn!(record_id = %record_id, "analysis requested but no adapter configured");
                    task.warnings
                        .push("analysis requested but no adapter configured".to_string());
                }
            }
        }

        // Finalize with a single write; a task never reports success it
        // could not persist.
        task.state = TaskState::Finalizing;
        let mut patch = RecordPatch::default()
            .with_status(RecordStatus::Cataloged)
            .with_assets(task.assets.clone())
            .with_metadata(task.metadata.clone());
        if !options.context_notes.is_empty() {
            patch = patch.with_notes(&options.context_notes);
        }
        if analyzed {
            patch = patch.with_analyzed_at(&chrono::Utc::now().to_rfc3339());
        }

        match self.records.update(&record_id, patch).await {
            Ok(()) => {
                debug!(record_id = %record_id, assets = task.assets.len(), "task completed");
                task.complete();
            }
            Err(err) => {
                let reason = format!("failed to finalize record {record_id}: {err}");
                self.mark_record_failed(&record_id, &reason).await;
                task.fail(&reason);
            }
        }
    }

    /// Best-effort status flip so a half-ingested record shows up as failed
    async fn mark_record_failed(&self, record_id: &str, reason: &str) {
        let patch = RecordPatch::default()
            .with_status(RecordStatus::Failed)
            .with_failure_reason(Some(reason.to_string()));
        if let Err(err) = self.records.update(record_id, patch).await {
            warn!(record_id = %record_id, error = %err, "could not mark record as failed");
        }
    }
}
