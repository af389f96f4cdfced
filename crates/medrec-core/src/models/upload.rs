use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::error::LogLevel;
use crate::storage_types::StorageBackend;

/// Per-slot upload status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Pending,
    Uploading,
    Processing,
    Completed,
    CompletedDuplicate,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::CompletedDuplicate | UploadStatus::Failed
        )
    }

    /// Whether the slot counts as settled successfully for queue clearing.
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::CompletedDuplicate
        )
    }

    /// Forward-only status machine:
    /// `pending -> uploading -> [processing] -> completed | completed_duplicate | failed`.
    /// A slot may also fail before its transfer starts. Same-status moves are
    /// progress-only updates and are allowed for non-terminal statuses.
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (Pending, Pending | Uploading | Failed) => true,
            (Uploading, Uploading | Processing) => true,
            (Uploading, Completed | CompletedDuplicate | Failed) => true,
            (Processing, Processing | Completed | CompletedDuplicate | Failed) => true,
            _ => false,
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Pending => write!(f, "pending"),
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Processing => write!(f, "processing"),
            UploadStatus::Completed => write!(f, "completed"),
            UploadStatus::CompletedDuplicate => write!(f, "completed_duplicate"),
            UploadStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Client-side classification of an upload problem, used to pick guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CorruptedFile,
    FileTooLarge,
    PermissionError,
    StorageFull,
    NetworkError,
    OcrFailed,
    Duplicate,
    UploadFailed,
}

impl ErrorCategory {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::CorruptedFile => "corrupted_file",
            ErrorCategory::FileTooLarge => "file_too_large",
            ErrorCategory::PermissionError => "permission_error",
            ErrorCategory::StorageFull => "storage_full",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::OcrFailed => "ocr_failed",
            ErrorCategory::Duplicate => "duplicate",
            ErrorCategory::UploadFailed => "upload_failed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "corrupted_file" => Some(ErrorCategory::CorruptedFile),
            "file_too_large" => Some(ErrorCategory::FileTooLarge),
            "permission_error" => Some(ErrorCategory::PermissionError),
            "storage_full" => Some(ErrorCategory::StorageFull),
            "network_error" => Some(ErrorCategory::NetworkError),
            "ocr_failed" => Some(ErrorCategory::OcrFailed),
            "duplicate" => Some(ErrorCategory::Duplicate),
            "upload_failed" => Some(ErrorCategory::UploadFailed),
            _ => None,
        }
    }

    /// Duplicates are an acceptable terminal outcome, everything else is not.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ErrorCategory::Duplicate)
    }

    /// OCR problems and duplicates are reported as warnings, not hard errors.
    pub fn log_level(&self) -> LogLevel {
        match self {
            ErrorCategory::Duplicate => LogLevel::Debug,
            ErrorCategory::OcrFailed
            | ErrorCategory::FileTooLarge
            | ErrorCategory::CorruptedFile => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    /// User guidance for this category on the given backend.
    pub fn guidance(&self, backend: StorageBackend) -> &'static str {
        match (self, backend) {
            (ErrorCategory::CorruptedFile, _) => {
                "The file appears to be damaged. Re-export or re-scan it and add it again."
            }
            (ErrorCategory::FileTooLarge, StorageBackend::Paperless) => {
                "The file exceeds the Paperless upload limit. Compress or split the document."
            }
            (ErrorCategory::FileTooLarge, StorageBackend::Local) => {
                "The file exceeds the server upload limit. Compress or split the document."
            }
            (ErrorCategory::PermissionError, StorageBackend::Paperless) => {
                "Paperless rejected the credentials. Check the Paperless connection in Settings."
            }
            (ErrorCategory::PermissionError, StorageBackend::Local) => {
                "Your account is not allowed to attach files to this record."
            }
            (ErrorCategory::StorageFull, _) => {
                "The storage backend has run out of space. Contact your administrator."
            }
            (ErrorCategory::NetworkError, StorageBackend::Paperless) => {
                "Paperless could not be reached. Check that the integration is enabled and connected in Settings."
            }
            (ErrorCategory::NetworkError, StorageBackend::Local) => {
                "The server could not be reached. Check your connection and try again."
            }
            (ErrorCategory::OcrFailed, _) => {
                "Text recognition failed. Upload a clearer scan or a text-based PDF."
            }
            (ErrorCategory::Duplicate, _) => {
                "This document already exists in Paperless; the new copy was discarded."
            }
            (ErrorCategory::UploadFailed, _) => {
                "The upload failed. Add the file again to retry."
            }
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.code())
    }
}

/// Problem attached to a slot: a hard error for `failed`, a notice for
/// `completed_duplicate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadIssue {
    pub category: ErrorCategory,
    pub message: String,
}

/// Status and progress of one queue slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub status: UploadStatus,
    pub progress: u8,
    pub error: Option<UploadIssue>,
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.duplicates + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn record(&mut self, status: UploadStatus) {
        match status {
            UploadStatus::Completed => self.succeeded += 1,
            UploadStatus::CompletedDuplicate => self.duplicates += 1,
            UploadStatus::Failed => self.failed += 1,
            _ => {}
        }
    }
}
