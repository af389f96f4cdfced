//! Test helpers: an in-memory entity file API and a recording observer.
//!
//! Run from workspace root: `cargo test -p medrec-uploads`.

#![allow(dead_code)]

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use medrec_core::models::{
    DownloadedFile, EntityType, FileRecord, MonitoredUpload, ProgressFn, ProgressPhase,
    ProgressUpdate, TaskState, TaskStatusResponse, UploadRequest,
};
use medrec_core::{
    ApiError, ApiResult, DocumentMode, EntityFileApi, StorageBackend, StorageBackendSettings,
    UploadConfig,
};
use medrec_uploads::{DocumentManager, DocumentManagerObserver, UploadControl};
use tokio_util::sync::CancellationToken;

/// Scripted result for an upload, keyed by file name.
#[derive(Clone, Debug)]
pub enum MockOutcome {
    Stored,
    Duplicate,
    TaskFailure(String),
    Error(ApiError),
}

#[derive(Default)]
pub struct MockFileApi {
    pub files: Mutex<Vec<FileRecord>>,
    pub uploads: Mutex<Vec<UploadRequest>>,
    pub deleted: Mutex<Vec<i64>>,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    failing_deletes: Mutex<HashSet<i64>>,
    settings: Mutex<Option<StorageBackendSettings>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicI64,
}

impl MockFileApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(100),
            ..Self::default()
        })
    }

    pub fn with_outcome(&self, file_name: &str, outcome: MockOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(file_name.to_string(), outcome);
    }

    pub fn with_settings(&self, settings: StorageBackendSettings) {
        *self.settings.lock().unwrap() = Some(settings);
    }

    pub fn with_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_delete(&self, file_id: i64) {
        self.failing_deletes.lock().unwrap().insert(file_id);
    }

    /// Seed existing attachments for an entity.
    pub fn seed_files(&self, entity_type: EntityType, entity_id: i64, names: &[&str]) -> Vec<i64> {
        let mut files = self.files.lock().unwrap();
        names
            .iter()
            .map(|name| {
                let record = file_record(
                    self.next_id.fetch_add(1, Ordering::SeqCst),
                    entity_type,
                    entity_id,
                    name,
                );
                let id = record.id;
                files.push(record);
                id
            })
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    fn outcome_for(&self, name: &str) -> MockOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(MockOutcome::Stored)
    }

    fn store(&self, request: &UploadRequest) -> FileRecord {
        let mut record = file_record(
            self.next_id.fetch_add(1, Ordering::SeqCst),
            request.entity_type,
            request.entity_id,
            &request.file.name,
        );
        record.storage_backend = request.backend;
        record.file_size = request.file.size();
        self.files.lock().unwrap().push(record.clone());
        record
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn file_record(id: i64, entity_type: EntityType, entity_id: i64, name: &str) -> FileRecord {
    FileRecord {
        id,
        entity_type,
        entity_id,
        file_name: name.to_string(),
        file_size: 10,
        file_type: "application/pdf".to_string(),
        description: None,
        storage_backend: StorageBackend::Local,
        paperless_document_id: None,
        uploaded_at: Utc::now(),
    }
}

fn failed_task(result: &str) -> TaskStatusResponse {
    TaskStatusResponse {
        task_id: "task-1".to_string(),
        status: TaskState::Failure,
        result: Some(result.to_string()),
        error_type: None,
        document_id: None,
        is_duplicate: false,
    }
}

#[async_trait]
impl EntityFileApi for MockFileApi {
    async fn get_entity_files(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> ApiResult<Vec<FileRecord>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.entity_type == entity_type && f.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn upload_entity_file(&self, request: &UploadRequest) -> ApiResult<FileRecord> {
        self.uploads.lock().unwrap().push(request.clone());
        self.wait().await;
        match self.outcome_for(&request.file.name) {
            MockOutcome::Stored => Ok(self.store(request)),
            MockOutcome::Duplicate => Err(ApiError::Http {
                status: 409,
                code: Some("duplicate".to_string()),
                message: "Document already exists".to_string(),
            }),
            MockOutcome::TaskFailure(message) => Err(ApiError::Http {
                status: 422,
                code: None,
                message,
            }),
            MockOutcome::Error(e) => Err(e),
        }
    }

    async fn upload_entity_file_with_task_monitoring(
        &self,
        request: &UploadRequest,
        cancel: CancellationToken,
        on_progress: Option<ProgressFn>,
    ) -> ApiResult<MonitoredUpload> {
        self.uploads.lock().unwrap().push(request.clone());
        if let Some(progress) = &on_progress {
            progress(ProgressUpdate {
                phase: ProgressPhase::Uploading,
                percent: 100,
            });
            progress(ProgressUpdate {
                phase: ProgressPhase::Processing,
                percent: 0,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            _ = self.wait() => {}
        }

        match self.outcome_for(&request.file.name) {
            MockOutcome::Stored => Ok(MonitoredUpload {
                task_monitored: true,
                success: true,
                file: Some(self.store(request)),
                ..MonitoredUpload::default()
            }),
            MockOutcome::Duplicate => Ok(MonitoredUpload {
                task_monitored: true,
                success: false,
                is_duplicate: true,
                task_result: Some(failed_task("Not consuming: It is a duplicate.")),
                file: None,
            }),
            MockOutcome::TaskFailure(message) => Ok(MonitoredUpload {
                task_monitored: true,
                success: false,
                is_duplicate: false,
                task_result: Some(failed_task(&message)),
                file: None,
            }),
            MockOutcome::Error(e) => Err(e),
        }
    }

    async fn delete_entity_file(&self, file_id: i64) -> ApiResult<()> {
        if self.failing_deletes.lock().unwrap().contains(&file_id) {
            return Err(ApiError::Http {
                status: 500,
                code: None,
                message: "Delete failed".to_string(),
            });
        }
        self.files.lock().unwrap().retain(|f| f.id != file_id);
        self.deleted.lock().unwrap().push(file_id);
        Ok(())
    }

    async fn download_entity_file(
        &self,
        file_id: i64,
        file_name: &str,
    ) -> ApiResult<DownloadedFile> {
        if !self.files.lock().unwrap().iter().any(|f| f.id == file_id) {
            return Err(ApiError::Http {
                status: 404,
                code: None,
                message: "File not found".to_string(),
            });
        }
        Ok(DownloadedFile {
            file_name: file_name.to_string(),
            content_type: "application/pdf".to_string(),
            data: fixtures::minimal_pdf().into(),
        })
    }

    async fn view_entity_file(&self, file_id: i64, file_name: &str) -> ApiResult<DownloadedFile> {
        self.download_entity_file(file_id, file_name).await
    }

    async fn get_storage_backend_settings(&self) -> ApiResult<StorageBackendSettings> {
        let settings = *self.settings.lock().unwrap();
        settings.ok_or_else(|| ApiError::Network("connection refused".to_string()))
    }
}

/// Observer that records every notification.
#[derive(Default)]
pub struct RecordingObserver {
    pub counts: Mutex<Vec<usize>>,
    pub errors: Mutex<Vec<String>>,
    pub control: Mutex<Option<UploadControl>>,
    pub registrations: Mutex<usize>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_count(&self) -> Option<usize> {
        self.counts.lock().unwrap().last().copied()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn control(&self) -> UploadControl {
        self.control
            .lock()
            .unwrap()
            .clone()
            .expect("control registered")
    }
}

impl DocumentManagerObserver for RecordingObserver {
    fn on_file_count_change(&self, count: usize) {
        self.counts.lock().unwrap().push(count);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_control_registered(&self, control: UploadControl) {
        *self.registrations.lock().unwrap() += 1;
        *self.control.lock().unwrap() = Some(control);
    }
}

pub fn upload_config(mode: DocumentMode) -> UploadConfig {
    UploadConfig {
        accepted_types: vec![".pdf".to_string(), "image/*".to_string()],
        max_size_bytes: 1024,
        max_files: 10,
        progress_tick_ms: 5,
        ..UploadConfig::default()
    }
    .with_mode(mode)
}

pub fn paperless_settings() -> StorageBackendSettings {
    StorageBackendSettings {
        enabled: true,
        connected: true,
        default_backend: StorageBackend::Paperless,
    }
}

/// Manager for a visit record with a recording observer.
pub fn manager(
    api: &Arc<MockFileApi>,
    mode: DocumentMode,
    entity_id: Option<i64>,
) -> (DocumentManager, Arc<RecordingObserver>) {
    manager_with_config(api, upload_config(mode), entity_id)
}

pub fn manager_with_config(
    api: &Arc<MockFileApi>,
    config: UploadConfig,
    entity_id: Option<i64>,
) -> (DocumentManager, Arc<RecordingObserver>) {
    let observer = RecordingObserver::new();
    let manager = DocumentManager::new(
        api.clone(),
        EntityType::Visit,
        entity_id,
        config,
        observer.clone(),
    )
    .expect("valid manager");
    (manager, observer)
}
