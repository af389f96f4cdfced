//! Entity file endpoints and the [`EntityFileApi`] implementation.
//!
//! Local uploads settle with the POST response. Paperless uploads return a
//! consumption task id which is polled until the task reaches a terminal state.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ApiClient;
use medrec_core::models::{
    DownloadedFile, EntityType, FilePayload, FileRecord, MonitoredUpload, ProgressFn,
    ProgressPhase, ProgressUpdate, TaskState, TaskStatusResponse, UploadRequest,
};
use medrec_core::{ApiError, ApiResult, EntityFileApi, StorageBackendSettings};

/// Size of the chunks the upload body is streamed in when progress is tracked.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Response of a Paperless upload submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperlessUploadResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub file: Option<FileRecord>,
}

fn files_path(entity_type: EntityType, entity_id: i64) -> String {
    format!("/entity-files/{}/{}/files", entity_type, entity_id)
}

fn content_type_for(file: &FilePayload) -> String {
    if file.content_type.trim().is_empty() {
        mime_guess::from_path(&file.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        file.content_type.clone()
    }
}

/// Split the payload into cheap `Bytes` slices.
fn chunk_payload(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
    let mut start = 0;
    while start < data.len() {
        let end = (start + chunk_size).min(data.len());
        chunks.push(data.slice(start..end));
        start = end;
    }
    chunks
}

/// Build the `file` part. With a progress sink the body is streamed in chunks
/// and each chunk pulled by the transport reports its cumulative percentage.
fn file_part(file: &FilePayload, on_progress: Option<ProgressFn>) -> ApiResult<Part> {
    let total = file.size();
    let part = match on_progress {
        None => Part::bytes(file.data.to_vec()),
        Some(progress) => {
            let mut sent: u64 = 0;
            let chunks = chunk_payload(&file.data, UPLOAD_CHUNK_SIZE);
            let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
                sent += chunk.len() as u64;
                let percent = if total == 0 {
                    100
                } else {
                    ((sent * 100) / total).min(100) as u8
                };
                progress(ProgressUpdate {
                    phase: ProgressPhase::Uploading,
                    percent,
                });
                Ok::<Bytes, std::io::Error>(chunk)
            }));
            Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        }
    };

    part.file_name(file.name.clone())
        .mime_str(&content_type_for(file))
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid content type: {}", e)))
}

fn upload_form(request: &UploadRequest, on_progress: Option<ProgressFn>) -> ApiResult<Form> {
    let mut form = Form::new()
        .part("file", file_part(&request.file, on_progress)?)
        .text("description", request.description.clone())
        .text("storage_backend", request.backend.to_string());

    if !request.extra.is_null() {
        form = form.text("extra", request.extra.to_string());
    }

    Ok(form)
}

impl ApiClient {
    /// Poll a Paperless consumption task until it is terminal.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn poll_task(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<TaskStatusResponse> {
        let path = format!("/paperless/tasks/{}/status", urlencoding::encode(task_id));
        let max_attempts = self.poll.max_attempts;
        let mut attempts = 0;

        loop {
            let status: TaskStatusResponse = tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                status = self.get(&path, &[]) => status?,
            };
            attempts += 1;

            if status.is_terminal() {
                tracing::info!(
                    task_id = %task_id,
                    status = %status.status,
                    attempts,
                    "Paperless task finished"
                );
                return Ok(status);
            }

            if attempts >= max_attempts {
                tracing::warn!(task_id = %task_id, attempts, "Paperless task polling gave up");
                return Err(ApiError::TaskTimeout {
                    task_id: task_id.to_string(),
                    attempts,
                });
            }

            tracing::debug!(task_id = %task_id, status = %status.status, "Paperless task still running");
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }
}

#[async_trait]
impl EntityFileApi for ApiClient {
    async fn get_entity_files(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> ApiResult<Vec<FileRecord>> {
        self.get(&files_path(entity_type, entity_id), &[]).await
    }

    #[tracing::instrument(skip(self, request), fields(entity_type = %request.entity_type, entity_id = request.entity_id, file = %request.file.name))]
    async fn upload_entity_file(&self, request: &UploadRequest) -> ApiResult<FileRecord> {
        let form = upload_form(request, None)?;
        let record: FileRecord = self
            .post_multipart(&files_path(request.entity_type, request.entity_id), form)
            .await?;

        tracing::info!(file_id = record.id, "File uploaded to local storage");
        Ok(record)
    }

    #[tracing::instrument(skip(self, request, cancel, on_progress), fields(entity_type = %request.entity_type, entity_id = request.entity_id, file = %request.file.name))]
    async fn upload_entity_file_with_task_monitoring(
        &self,
        request: &UploadRequest,
        cancel: CancellationToken,
        on_progress: Option<ProgressFn>,
    ) -> ApiResult<MonitoredUpload> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let form = upload_form(request, on_progress.clone())?;
        let path = files_path(request.entity_type, request.entity_id);
        let submitted: PaperlessUploadResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            response = self.post_multipart(&path, form) => response?,
        };

        let Some(task_id) = submitted.task_id else {
            tracing::debug!("Upload settled without a background task");
            return Ok(MonitoredUpload {
                task_monitored: false,
                success: true,
                is_duplicate: false,
                task_result: None,
                file: submitted.file,
            });
        };

        if let Some(progress) = &on_progress {
            progress(ProgressUpdate {
                phase: ProgressPhase::Processing,
                percent: 0,
            });
        }

        let task = self.poll_task(&task_id, &cancel).await?;
        let is_duplicate = task.is_duplicate();
        let success = task.status == TaskState::Success && !is_duplicate;

        Ok(MonitoredUpload {
            task_monitored: true,
            success,
            is_duplicate,
            task_result: Some(task),
            file: submitted.file,
        })
    }

    async fn delete_entity_file(&self, file_id: i64) -> ApiResult<()> {
        self.delete(&format!("/entity-files/files/{}", file_id)).await
    }

    async fn download_entity_file(
        &self,
        file_id: i64,
        file_name: &str,
    ) -> ApiResult<DownloadedFile> {
        let (data, content_type) = self
            .get_bytes(&format!("/entity-files/files/{}/download", file_id), &[])
            .await?;

        Ok(DownloadedFile {
            file_name: file_name.to_string(),
            content_type,
            data,
        })
    }

    async fn view_entity_file(&self, file_id: i64, file_name: &str) -> ApiResult<DownloadedFile> {
        let (data, content_type) = self
            .get_bytes(
                &format!("/entity-files/files/{}/view", file_id),
                &[("filename", file_name.to_string())],
            )
            .await?;

        Ok(DownloadedFile {
            file_name: file_name.to_string(),
            content_type,
            data,
        })
    }

    async fn get_storage_backend_settings(&self) -> ApiResult<StorageBackendSettings> {
        self.get("/paperless/settings", &[]).await
    }
}
