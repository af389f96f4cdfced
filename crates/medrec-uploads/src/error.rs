use medrec_core::models::{BatchOutcome, ErrorCategory, UploadStatus};
use medrec_core::{ApiError, DocumentMode, StorageBackend};
use serde::Serialize;
use thiserror::Error;

/// A staged file was refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{name} is {size} bytes, above the {max} byte limit")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("{name} is not an accepted file type ({content_type})")]
    UnsupportedType { name: String, content_type: String },

    #[error("Cannot add {name}: at most {max} files can be pending")]
    TooManyFiles { name: String, max: usize },
}

/// A progress tracker update that the status machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No upload slot at index {0}")]
    UnknownSlot(usize),

    #[error("Slot {index} already settled as {status}")]
    Terminal { index: usize, status: UploadStatus },

    #[error("Slot {index} cannot move from {from} to {to}")]
    Invalid {
        index: usize,
        from: UploadStatus,
        to: UploadStatus,
    },
}

/// One file of a failed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub index: usize,
    pub file_name: String,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Documents are read-only in view mode")]
    ReadOnly,

    #[error("An entity id is required in {0} mode")]
    MissingEntity(DocumentMode),

    #[error("Invalid entity id: {0}")]
    InvalidEntityId(i64),

    #[error("An upload batch is already in flight")]
    BatchInFlight,

    #[error("{} of {} files failed to upload", .outcome.failed, .outcome.total())]
    BatchFailed {
        outcome: BatchOutcome,
        failures: Vec<FailedUpload>,
    },

    #[error("Storage backend {backend} is unavailable. {guidance}")]
    BackendUnavailable {
        backend: StorageBackend,
        guidance: &'static str,
    },

    #[error("Unknown file: {0}")]
    UnknownFile(i64),

    #[error("Uploads or deletions are still in progress")]
    Blocking,

    #[error("Document manager has been closed")]
    Closed,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the owning page should keep its form open for a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::BatchFailed { .. } | UploadError::BatchInFlight | UploadError::Api(_)
        )
    }
}
