//! Upload orchestration.
//!
//! Single files are sent to the backend-appropriate endpoint and settled into
//! a [`FileOutcome`]. Batches run every slot concurrently and funnel progress
//! through one channel, so tracker writes happen in one place and in the
//! order each slot produced them.

use std::sync::Arc;

use futures::future::join_all;
use medrec_core::models::{
    ErrorCategory, FileRecord, MonitoredUpload, ProgressFn, ProgressPhase, ProgressUpdate,
    UploadIssue, UploadRequest, UploadStatus,
};
use medrec_core::{ApiError, ApiResult, EntityFileApi, LogLevel};
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::classify::{classify, classify_task};
use crate::estimator::ProgressEstimator;
use crate::progress::{ProgressTracker, RecordPatch};

type SlotSender = mpsc::UnboundedSender<(usize, RecordPatch)>;

/// Settled result of one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub index: usize,
    pub file_name: String,
    pub status: UploadStatus,
    pub issue: Option<UploadIssue>,
    /// Stored record when the server returned one.
    pub file: Option<FileRecord>,
}

impl FileOutcome {
    fn patch(&self) -> RecordPatch {
        match (self.status, &self.issue) {
            (UploadStatus::Completed, _) => RecordPatch::completed(),
            (UploadStatus::CompletedDuplicate, Some(notice)) => RecordPatch::duplicate(notice.clone()),
            (UploadStatus::Failed, Some(issue)) => RecordPatch::failed(issue.clone()),
            (status, _) => RecordPatch::status(status),
        }
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    api: Arc<dyn EntityFileApi>,
    estimator: ProgressEstimator,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn EntityFileApi>) -> Self {
        Self {
            api,
            estimator: ProgressEstimator::default(),
        }
    }

    pub fn with_estimator(mut self, estimator: ProgressEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Upload one file without tracking. Never returns an error: failures are
    /// settled into the outcome.
    #[tracing::instrument(skip(self, request, cancel), fields(file = %request.file.name, backend = %request.backend))]
    pub async fn upload_one(&self, request: &UploadRequest, cancel: &CancellationToken) -> FileOutcome {
        self.upload_slot(0, request, cancel, None).await
    }

    /// Upload every request concurrently, applying progress to `tracker`.
    /// Outcomes come back in request order.
    #[tracing::instrument(skip_all, fields(files = requests.len()))]
    pub async fn run_batch(
        &self,
        requests: &[UploadRequest],
        cancel: &CancellationToken,
        tracker: &RwLock<ProgressTracker>,
    ) -> Vec<FileOutcome> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uploads = join_all(
            requests
                .iter()
                .enumerate()
                .map(|(index, request)| self.upload_slot(index, request, cancel, Some(tx.clone()))),
        );
        drop(tx);
        tokio::pin!(uploads);

        let outcomes = loop {
            tokio::select! {
                Some((index, patch)) = rx.recv() => {
                    apply(tracker, index, patch).await;
                }
                outcomes = &mut uploads => break outcomes,
            }
        };

        while let Ok((index, patch)) = rx.try_recv() {
            apply(tracker, index, patch).await;
        }

        outcomes
    }

    async fn upload_slot(
        &self,
        index: usize,
        request: &UploadRequest,
        cancel: &CancellationToken,
        updates: Option<SlotSender>,
    ) -> FileOutcome {
        send(&updates, index, RecordPatch::status(UploadStatus::Uploading).with_progress(0));

        let result = if request.backend.is_task_monitored() {
            let on_progress = updates.clone().map(|tx| progress_sink(tx, index));
            self.api
                .upload_entity_file_with_task_monitoring(request, cancel.clone(), on_progress)
                .await
        } else {
            self.upload_direct(index, request, cancel, &updates).await
        };

        let outcome = settle(index, request, result);
        send(&updates, index, outcome.patch());
        outcome
    }

    /// Upload to a backend that reports no progress, ticking the estimator
    /// until the response arrives.
    async fn upload_direct(
        &self,
        index: usize,
        request: &UploadRequest,
        cancel: &CancellationToken,
        updates: &Option<SlotSender>,
    ) -> ApiResult<MonitoredUpload> {
        let upload = self.api.upload_entity_file(request);
        tokio::pin!(upload);

        let mut ticker = tokio::time::interval(self.estimator.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        let mut estimate = 0u8;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                result = &mut upload => {
                    return result.map(|file| MonitoredUpload {
                        task_monitored: false,
                        success: true,
                        file: Some(file),
                        ..MonitoredUpload::default()
                    });
                }
                _ = ticker.tick() => {
                    estimate = self.estimator.next(estimate);
                    send(updates, index, RecordPatch::progress(estimate));
                }
            }
        }
    }
}

fn send(updates: &Option<SlotSender>, index: usize, patch: RecordPatch) {
    if let Some(tx) = updates {
        let _ = tx.send((index, patch));
    }
}

fn progress_sink(tx: SlotSender, index: usize) -> ProgressFn {
    Arc::new(move |update: ProgressUpdate| {
        let patch = match update.phase {
            ProgressPhase::Uploading => RecordPatch::progress(update.percent),
            ProgressPhase::Processing => {
                RecordPatch::status(UploadStatus::Processing).with_progress(update.percent)
            }
        };
        let _ = tx.send((index, patch));
    })
}

async fn apply(tracker: &RwLock<ProgressTracker>, index: usize, patch: RecordPatch) {
    if let Err(e) = tracker.write().await.set(index, patch) {
        tracing::debug!(index = index, error = %e, "Dropping stale upload update");
    }
}

fn settle(index: usize, request: &UploadRequest, result: ApiResult<MonitoredUpload>) -> FileOutcome {
    let file_name = request.file.name.clone();
    let (category, message, file) = match result {
        Ok(upload) if upload.is_duplicate => (
            ErrorCategory::Duplicate,
            upload
                .task_result
                .as_ref()
                .and_then(|t| t.result.clone())
                .unwrap_or_else(|| "Document already exists".to_string()),
            upload.file,
        ),
        Ok(upload) if upload.success => {
            tracing::info!(
                index = index,
                file_name = %file_name,
                backend = %request.backend,
                "File uploaded"
            );
            return FileOutcome {
                index,
                file_name,
                status: UploadStatus::Completed,
                issue: None,
                file: upload.file,
            };
        }
        Ok(upload) => {
            let message = upload.failure_message();
            (classify_task(upload.error_code(), &message), message, upload.file)
        }
        Err(e) => (classify(&e), e.message(), None),
    };

    let status = if category.is_failure() {
        UploadStatus::Failed
    } else {
        UploadStatus::CompletedDuplicate
    };

    match category.log_level() {
        LogLevel::Debug => {
            tracing::debug!(index = index, file_name = %file_name, category = %category, message = %message, "Upload settled");
        }
        LogLevel::Warn => {
            tracing::warn!(index = index, file_name = %file_name, category = %category, message = %message, "Upload failed");
        }
        LogLevel::Error => {
            tracing::error!(index = index, file_name = %file_name, category = %category, message = %message, "Upload failed");
        }
    }

    FileOutcome {
        index,
        file_name,
        status,
        issue: Some(UploadIssue { category, message }),
        file: if status == UploadStatus::CompletedDuplicate { file } else { None },
    }
}
