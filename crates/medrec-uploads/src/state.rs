//! State shared between a [`DocumentManager`](crate::DocumentManager) and the
//! [`UploadControl`](crate::UploadControl) handles it gives out.
//!
//! Locks are never held across network calls. When both are needed, `state`
//! is taken before `tracker`.

use std::sync::Arc;

use medrec_core::models::{
    BatchOutcome, EntityType, ErrorCategory, FileRecord, UploadRecord, UploadRequest, UploadStatus,
};
use medrec_core::{DocumentMode, EntityFileApi, StorageBackend, StorageBackendSettings, UploadConfig};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::control::DocumentManagerObserver;
use crate::deletion::{self, DeletionMarks, DeletionReport};
use crate::error::{FailedUpload, UploadError};
use crate::estimator::ProgressEstimator;
use crate::orchestrator::UploadOrchestrator;
use crate::progress::ProgressTracker;
use crate::queue::PendingFileQueue;
use crate::validation::FileValidator;

pub(crate) struct ManagerState {
    pub mode: DocumentMode,
    pub entity_type: EntityType,
    pub entity_id: Option<i64>,
    pub queue: PendingFileQueue,
    pub marks: DeletionMarks,
    pub files: Vec<FileRecord>,
    pub settings: StorageBackendSettings,
    pub backend: StorageBackend,
    pub extra: serde_json::Value,
    /// Token of the batch in flight, if any.
    pub batch: Option<CancellationToken>,
    /// Records of the last settled batch, kept after the queue is cleared.
    pub last_batch: Vec<UploadRecord>,
    pub deleting: bool,
}

impl ManagerState {
    /// Existing files not marked for deletion, plus pending ones.
    pub fn file_count(&self) -> usize {
        let visible = self
            .files
            .iter()
            .filter(|f| !self.marks.is_marked(f.id))
            .count();
        visible + self.queue.len()
    }

    pub fn is_blocking(&self) -> bool {
        self.batch.is_some() || self.deleting
    }
}

pub(crate) struct Shared {
    pub api: Arc<dyn EntityFileApi>,
    pub config: UploadConfig,
    pub observer: Arc<dyn DocumentManagerObserver>,
    pub orchestrator: UploadOrchestrator,
    pub state: RwLock<ManagerState>,
    pub tracker: RwLock<ProgressTracker>,
}

impl Shared {
    pub fn new(
        api: Arc<dyn EntityFileApi>,
        entity_type: EntityType,
        entity_id: Option<i64>,
        config: UploadConfig,
        observer: Arc<dyn DocumentManagerObserver>,
    ) -> Self {
        let settings = StorageBackendSettings::default();
        let state = ManagerState {
            mode: config.mode,
            entity_type,
            entity_id,
            queue: PendingFileQueue::new(FileValidator::from_config(&config)),
            marks: DeletionMarks::new(),
            files: Vec::new(),
            settings,
            backend: settings.effective_default(),
            extra: serde_json::Value::Null,
            batch: None,
            last_batch: Vec::new(),
            deleting: false,
        };

        Self {
            orchestrator: UploadOrchestrator::new(api.clone())
                .with_estimator(ProgressEstimator::default().with_tick(config.progress_tick())),
            api,
            config,
            observer,
            state: RwLock::new(state),
            tracker: RwLock::new(ProgressTracker::new()),
        }
    }

    pub async fn notify_count(&self) {
        let count = self.state.read().await.file_count();
        self.observer.on_file_count_change(count);
    }

    pub async fn is_blocking(&self) -> bool {
        self.state.read().await.is_blocking()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.queue.len()
    }

    pub async fn clear_pending(&self) -> Result<(), UploadError> {
        {
            let mut state = self.state.write().await;
            if state.batch.is_some() {
                return Err(UploadError::BatchInFlight);
            }
            state.queue.clear();
            self.tracker.write().await.clear();
        }
        self.notify_count().await;
        Ok(())
    }

    /// Upload every pending file to `entity_id`.
    ///
    /// The queue is cleared only when no file failed; otherwise it is kept
    /// whole and the per-file failures come back in [`UploadError::BatchFailed`].
    #[tracing::instrument(skip(self))]
    pub async fn upload_pending_files(&self, entity_id: i64) -> Result<BatchOutcome, UploadError> {
        if entity_id <= 0 {
            return Err(UploadError::InvalidEntityId(entity_id));
        }

        let cancel = CancellationToken::new();
        let requests: Vec<UploadRequest> = {
            let mut state = self.state.write().await;
            if state.mode == DocumentMode::View {
                return Err(UploadError::ReadOnly);
            }
            if state.batch.is_some() {
                return Err(UploadError::BatchInFlight);
            }
            if state.queue.is_empty() {
                return Ok(BatchOutcome::default());
            }

            let requests: Vec<UploadRequest> = state
                .queue
                .list()
                .iter()
                .map(|pending| UploadRequest {
                    entity_type: state.entity_type,
                    entity_id,
                    file: pending.file.clone(),
                    description: pending.description.clone(),
                    extra: state.extra.clone(),
                    backend: state.backend,
                })
                .collect();

            state.queue.set_locked(true);
            state.batch = Some(cancel.clone());
            self.tracker.write().await.init(state.queue.len());
            requests
        };

        let batch_id = Uuid::new_v4();
        tracing::info!(
            batch_id = %batch_id,
            entity_id = entity_id,
            files = requests.len(),
            "Starting upload batch"
        );

        let outcomes = self
            .orchestrator
            .run_batch(&requests, &cancel, &self.tracker)
            .await;

        let mut outcome = BatchOutcome::default();
        let mut failures = Vec::new();
        {
            let mut state = self.state.write().await;
            state.batch = None;
            state.queue.set_locked(false);

            for file_outcome in outcomes {
                outcome.record(file_outcome.status);
                if file_outcome.status == UploadStatus::Failed {
                    let (category, message) = file_outcome
                        .issue
                        .map(|i| (i.category, i.message))
                        .unwrap_or((ErrorCategory::UploadFailed, String::new()));
                    failures.push(FailedUpload {
                        index: file_outcome.index,
                        file_name: file_outcome.file_name,
                        category,
                        message,
                    });
                } else if let Some(file) = file_outcome.file {
                    state.files.push(file);
                }
            }

            let mut tracker = self.tracker.write().await;
            state.last_batch = tracker.snapshot();
            if outcome.is_success() {
                state.queue.clear();
                tracker.clear();
                state.entity_id = Some(entity_id);
            }
        }

        tracing::info!(
            batch_id = %batch_id,
            succeeded = outcome.succeeded,
            duplicates = outcome.duplicates,
            failed = outcome.failed,
            "Upload batch settled"
        );
        self.notify_count().await;

        if outcome.is_success() {
            return Ok(outcome);
        }

        let err = UploadError::BatchFailed { outcome, failures };
        self.observer.on_error(&err.to_string());
        Err(err)
    }

    /// Commit deletion marks. Failed ids stay marked.
    #[tracing::instrument(skip(self))]
    pub async fn delete_marked_files(&self) -> Result<DeletionReport, UploadError> {
        let ids = {
            let mut state = self.state.write().await;
            if state.mode == DocumentMode::View {
                return Err(UploadError::ReadOnly);
            }
            if state.deleting {
                return Err(UploadError::Blocking);
            }
            if state.marks.is_empty() {
                return Ok(DeletionReport::default());
            }
            state.deleting = true;
            state.marks.ids()
        };

        let report = deletion::commit(self.api.as_ref(), &ids).await;

        {
            let mut state = self.state.write().await;
            state.deleting = false;
            state.marks.apply(&report);
            state.files.retain(|f| !report.deleted.contains(&f.id));
        }
        self.notify_count().await;

        for failure in &report.failures {
            self.observer.on_error(&format!(
                "Failed to delete file {}: {}",
                failure.file_id, failure.message
            ));
        }
        Ok(report)
    }

    pub async fn cancel_batch(&self) {
        if let Some(token) = &self.state.read().await.batch {
            tracing::info!("Cancelling upload batch");
            token.cancel();
        }
    }
}
