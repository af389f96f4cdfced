//! Entity file API boundary.
//!
//! The upload core only talks to storage through this trait. The HTTP
//! implementation lives in `medrec-api-client`; tests provide in-memory ones.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;
use crate::models::{
    DownloadedFile, EntityType, FileRecord, MonitoredUpload, ProgressFn, UploadRequest,
};
use crate::storage_types::StorageBackendSettings;

/// Attachment storage operations for parent records.
#[async_trait]
pub trait EntityFileApi: Send + Sync {
    /// List the files attached to an entity.
    async fn get_entity_files(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> ApiResult<Vec<FileRecord>>;

    /// Upload to a backend that settles with the HTTP response.
    async fn upload_entity_file(&self, request: &UploadRequest) -> ApiResult<FileRecord>;

    /// Upload to a backend that settles through a background task, waiting
    /// for the task to reach a terminal state.
    ///
    /// Transport failures are `Err`. A task that ran and failed (including
    /// duplicate rejection) is `Ok` with `success == false`.
    async fn upload_entity_file_with_task_monitoring(
        &self,
        request: &UploadRequest,
        cancel: CancellationToken,
        on_progress: Option<ProgressFn>,
    ) -> ApiResult<MonitoredUpload>;

    async fn delete_entity_file(&self, file_id: i64) -> ApiResult<()>;

    /// Fetch a file as an attachment download.
    async fn download_entity_file(&self, file_id: i64, file_name: &str)
        -> ApiResult<DownloadedFile>;

    /// Fetch a file for inline viewing.
    async fn view_entity_file(&self, file_id: i64, file_name: &str) -> ApiResult<DownloadedFile>;

    async fn get_storage_backend_settings(&self) -> ApiResult<StorageBackendSettings>;
}
