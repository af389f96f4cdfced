use std::path::{Path, PathBuf};
use std::sync::Arc;

use medrec_core::models::{
    BatchOutcome, DownloadedFile, EntityType, FilePayload, FileRecord, UploadRecord,
    UploadStatus,
};
use medrec_core::{
    DocumentMode, EntityFileApi, StorageBackend, StorageBackendSettings, UploadConfig,
};
use serde::Serialize;

use crate::control::{DocumentManagerObserver, UploadControl};
use crate::deletion::DeletionReport;
use crate::error::{UploadError, ValidationError};
use crate::queue::{PendingFile, PendingFileId};
use crate::state::{ManagerState, Shared};

/// An existing file together with its deletion mark.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    #[serde(flatten)]
    pub file: FileRecord,
    pub marked_for_deletion: bool,
}

/// Result of staging several files at once.
#[derive(Debug, Default)]
pub struct AddFilesReport {
    pub added: Vec<PendingFileId>,
    pub rejected: Vec<ValidationError>,
    /// Set when the files were uploaded immediately.
    pub uploaded: Option<BatchOutcome>,
}

/// Attachment manager for one parent record.
///
/// In create mode files are only staged; the owner uploads them through the
/// [`UploadControl`] once the parent exists. Edit mode can also delete existing
/// files. View mode is read-only.
pub struct DocumentManager {
    shared: Arc<Shared>,
}

impl DocumentManager {
    pub fn new(
        api: Arc<dyn EntityFileApi>,
        entity_type: EntityType,
        entity_id: Option<i64>,
        config: UploadConfig,
        observer: Arc<dyn DocumentManagerObserver>,
    ) -> Result<Self, UploadError> {
        match entity_id {
            Some(id) if id <= 0 => return Err(UploadError::InvalidEntityId(id)),
            None if config.mode != DocumentMode::Create => {
                return Err(UploadError::MissingEntity(config.mode))
            }
            _ => {}
        }

        let shared = Arc::new(Shared::new(api, entity_type, entity_id, config, observer));
        let manager = Self { shared };
        manager
            .shared
            .observer
            .on_control_registered(manager.control());
        Ok(manager)
    }

    pub fn control(&self) -> UploadControl {
        UploadControl::new(&self.shared)
    }

    pub fn mode(&self) -> DocumentMode {
        self.shared.config.mode
    }

    pub async fn entity_id(&self) -> Option<i64> {
        self.shared.state.read().await.entity_id
    }

    /// Extra metadata sent with every upload.
    pub async fn set_upload_extra(&self, extra: serde_json::Value) {
        self.shared.state.write().await.extra = extra;
    }

    /// Fetch backend settings and reset the selection to the effective default.
    /// On failure the local backend stays selected.
    pub async fn load_settings(&self) -> Result<StorageBackendSettings, UploadError> {
        match self.shared.api.get_storage_backend_settings().await {
            Ok(settings) => {
                self.set_settings(settings).await;
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load storage settings, using local storage");
                self.set_settings(StorageBackendSettings::default()).await;
                Err(e.into())
            }
        }
    }

    pub async fn set_settings(&self, settings: StorageBackendSettings) {
        let mut state = self.shared.state.write().await;
        state.settings = settings;
        state.backend = settings.effective_default();
    }

    pub async fn settings(&self) -> StorageBackendSettings {
        self.shared.state.read().await.settings
    }

    pub async fn backend(&self) -> StorageBackend {
        self.shared.state.read().await.backend
    }

    /// Pick the backend for the next batch. `None` means the effective default.
    pub async fn select_backend(
        &self,
        choice: Option<StorageBackend>,
    ) -> Result<StorageBackend, UploadError> {
        let mut state = self.shared.state.write().await;
        let backend = choice.unwrap_or_else(|| state.settings.effective_default());
        if !state.settings.supports(backend) {
            drop(state);
            let err = UploadError::BackendUnavailable {
                backend,
                guidance: backend.unavailable_guidance(),
            };
            self.shared.observer.on_error(&err.to_string());
            return Err(err);
        }
        state.backend = backend;
        Ok(backend)
    }

    /// Load the files already attached to the entity.
    pub async fn load_files(&self) -> Result<Vec<FileRecord>, UploadError> {
        let (entity_type, entity_id) = {
            let state = self.shared.state.read().await;
            match state.entity_id {
                Some(id) => (state.entity_type, id),
                None => return Ok(Vec::new()),
            }
        };

        let files = match self.shared.api.get_entity_files(entity_type, entity_id).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(entity_type = %entity_type, entity_id = entity_id, error = %e, "Failed to load files");
                self.shared.observer.on_error(&e.to_string());
                return Err(e.into());
            }
        };

        {
            let mut state = self.shared.state.write().await;
            let known: Vec<i64> = files.iter().map(|f| f.id).collect();
            for id in state.marks.ids() {
                if !known.contains(&id) {
                    state.marks.unmark(id);
                }
            }
            state.files = files.clone();
        }
        self.shared.notify_count().await;
        Ok(files)
    }

    /// Validate and stage one file.
    pub async fn add_file(
        &self,
        file: FilePayload,
        description: impl Into<String>,
    ) -> Result<PendingFileId, UploadError> {
        let result = {
            let mut state = self.shared.state.write().await;
            if state.mode == DocumentMode::View {
                return Err(UploadError::ReadOnly);
            }
            if state.batch.is_some() {
                return Err(UploadError::BatchInFlight);
            }
            let result = state.queue.add(file, description);
            if result.is_ok() {
                self.shared.tracker.write().await.push_pending();
            }
            result
        };

        match result {
            Ok(id) => {
                self.shared.notify_count().await;
                Ok(id)
            }
            Err(e) => {
                tracing::debug!(error = %e, "File rejected");
                self.shared.observer.on_error(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Stage several files, reporting rejections individually. With auto
    /// upload on and the entity known, the queue is uploaded right away.
    pub async fn add_files<I>(&self, files: I) -> Result<AddFilesReport, UploadError>
    where
        I: IntoIterator<Item = (FilePayload, String)>,
    {
        let mut report = AddFilesReport::default();
        for (file, description) in files {
            match self.add_file(file, description).await {
                Ok(id) => report.added.push(id),
                Err(UploadError::Validation(e)) => report.rejected.push(e),
                Err(e) => return Err(e),
            }
        }

        let auto_upload_target = {
            let state = self.shared.state.read().await;
            match state.entity_id {
                Some(id) if state.mode != DocumentMode::View && self.shared.config.auto_upload => {
                    Some(id)
                }
                _ => None,
            }
        };

        if let Some(entity_id) = auto_upload_target {
            if !report.added.is_empty() {
                report.uploaded = Some(self.shared.upload_pending_files(entity_id).await?);
            }
        }

        Ok(report)
    }

    /// Remove a staged file that has not been picked up by a batch.
    pub async fn remove_pending_file(&self, id: PendingFileId) -> bool {
        let removed = {
            let mut state = self.shared.state.write().await;
            if !self.is_editable_slot(&state, id).await {
                return false;
            }
            let Some(index) = state.queue.position(id) else {
                return false;
            };
            let removed = state.queue.remove(id);
            if removed {
                self.shared.tracker.write().await.remove(index);
            }
            removed
        };
        if removed {
            self.shared.notify_count().await;
        }
        removed
    }

    pub async fn update_pending_description(&self, id: PendingFileId, text: impl Into<String>) -> bool {
        let mut state = self.shared.state.write().await;
        if !self.is_editable_slot(&state, id).await {
            return false;
        }
        state.queue.update_description(id, text)
    }

    async fn is_editable_slot(&self, state: &ManagerState, id: PendingFileId) -> bool {
        if state.mode == DocumentMode::View || state.batch.is_some() {
            return false;
        }
        match state.queue.position(id) {
            Some(index) => self.shared.tracker.read().await.status_of(index) == UploadStatus::Pending,
            None => false,
        }
    }

    pub async fn pending_files(&self) -> Vec<PendingFile> {
        self.shared.state.read().await.queue.list().to_vec()
    }

    /// One record per pending file, by queue position.
    pub async fn upload_records(&self) -> Vec<UploadRecord> {
        self.shared.tracker.read().await.snapshot()
    }

    /// Records of the last settled batch. Survives the queue being cleared
    /// after a successful upload.
    pub async fn last_batch_records(&self) -> Vec<UploadRecord> {
        self.shared.state.read().await.last_batch.clone()
    }

    pub async fn files(&self) -> Vec<FileRecord> {
        self.shared.state.read().await.files.clone()
    }

    pub async fn file_views(&self) -> Vec<FileView> {
        let state = self.shared.state.read().await;
        state
            .files
            .iter()
            .map(|file| FileView {
                file: file.clone(),
                marked_for_deletion: state.marks.is_marked(file.id),
            })
            .collect()
    }

    pub async fn file_count(&self) -> usize {
        self.shared.state.read().await.file_count()
    }

    /// Mark an existing file for deletion on the next commit.
    pub async fn mark_for_deletion(&self, file_id: i64) -> Result<bool, UploadError> {
        self.set_mark(file_id, true).await
    }

    pub async fn unmark_for_deletion(&self, file_id: i64) -> Result<bool, UploadError> {
        self.set_mark(file_id, false).await
    }

    async fn set_mark(&self, file_id: i64, marked: bool) -> Result<bool, UploadError> {
        let changed = {
            let mut state = self.shared.state.write().await;
            if state.mode == DocumentMode::View {
                return Err(UploadError::ReadOnly);
            }
            if state.deleting {
                return Err(UploadError::Blocking);
            }
            if !state.files.iter().any(|f| f.id == file_id) {
                return Err(UploadError::UnknownFile(file_id));
            }
            if marked {
                state.marks.mark(file_id)
            } else {
                state.marks.unmark(file_id)
            }
        };
        if changed {
            self.shared.notify_count().await;
        }
        Ok(changed)
    }

    pub async fn is_marked(&self, file_id: i64) -> bool {
        self.shared.state.read().await.marks.is_marked(file_id)
    }

    pub async fn upload_pending_files(&self, entity_id: i64) -> Result<BatchOutcome, UploadError> {
        self.shared.upload_pending_files(entity_id).await
    }

    pub async fn delete_marked_files(&self) -> Result<DeletionReport, UploadError> {
        self.shared.delete_marked_files().await
    }

    /// Download a file into `dest_dir`, returning the written path.
    pub async fn download_file(&self, file_id: i64, dest_dir: &Path) -> Result<PathBuf, UploadError> {
        let name = self.file_name_of(file_id).await;
        let downloaded = self.shared.api.download_entity_file(file_id, &name).await?;

        let file_name = safe_file_name(&downloaded.file_name)
            .or_else(|| safe_file_name(&name))
            .unwrap_or_else(|| format!("file-{}", file_id));
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(file_name);
        tokio::fs::write(&path, &downloaded.data).await?;

        tracing::info!(file_id = file_id, path = %path.display(), bytes = downloaded.data.len(), "File downloaded");
        Ok(path)
    }

    /// Fetch a file for inline viewing.
    pub async fn view_file(&self, file_id: i64) -> Result<DownloadedFile, UploadError> {
        let name = self.file_name_of(file_id).await;
        Ok(self.shared.api.view_entity_file(file_id, &name).await?)
    }

    async fn file_name_of(&self, file_id: i64) -> String {
        self.shared
            .state
            .read()
            .await
            .files
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.file_name.clone())
            .unwrap_or_else(|| format!("file-{}", file_id))
    }

    /// Abort the batch in flight. Unsent files settle as failed.
    pub async fn cancel_uploads(&self) {
        self.shared.cancel_batch().await;
    }

    pub async fn is_blocking(&self) -> bool {
        self.shared.is_blocking().await
    }

    /// Discard staged files, marks and records. Refused while blocking.
    pub async fn close(&self) -> Result<(), UploadError> {
        {
            let mut state = self.shared.state.write().await;
            if state.is_blocking() {
                return Err(UploadError::Blocking);
            }
            state.queue.clear();
            state.marks.clear();
            state.last_batch.clear();
            self.shared.tracker.write().await.clear();
        }
        self.shared.notify_count().await;
        Ok(())
    }
}

/// Final path component of a server-supplied name, if it is a usable file name.
fn safe_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
}
