//! Maps upload failures to an [`ErrorCategory`].
//!
//! Structured codes win, then HTTP status, then a keyword scan of the message
//! for servers that only send free text.

use medrec_core::models::ErrorCategory;
use medrec_core::ApiError;

const MESSAGE_KEYWORDS: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::Duplicate, &["duplicate", "already exists"]),
    (
        ErrorCategory::OcrFailed,
        &["ocr", "text recognition", "text extraction"],
    ),
    (
        ErrorCategory::CorruptedFile,
        &["corrupt", "damaged", "malformed", "invalid pdf", "cannot identify"],
    ),
    (
        ErrorCategory::StorageFull,
        &["no space", "disk full", "storage full", "quota", "insufficient storage"],
    ),
    (
        ErrorCategory::FileTooLarge,
        &["too large", "too big", "exceeds", "size limit"],
    ),
    (
        ErrorCategory::PermissionError,
        &[
            "permission",
            "forbidden",
            "unauthorized",
            "not authorized",
            "access denied",
            "authentication",
        ],
    ),
    (
        ErrorCategory::NetworkError,
        &["network", "timeout", "timed out", "connection", "unreachable"],
    ),
];

/// Category for a structured server code, accepting common aliases.
pub fn category_from_code(code: &str) -> Option<ErrorCategory> {
    if let Some(category) = ErrorCategory::from_code(code) {
        return Some(category);
    }
    match code.to_lowercase().as_str() {
        "duplicate_document" | "document_exists" => Some(ErrorCategory::Duplicate),
        "payload_too_large" | "too_large" => Some(ErrorCategory::FileTooLarge),
        "unauthorized" | "forbidden" | "permission_denied" => Some(ErrorCategory::PermissionError),
        "insufficient_storage" | "quota_exceeded" => Some(ErrorCategory::StorageFull),
        "invalid_file" | "corrupted" => Some(ErrorCategory::CorruptedFile),
        "ocr_error" => Some(ErrorCategory::OcrFailed),
        "connection_error" | "timeout" => Some(ErrorCategory::NetworkError),
        _ => None,
    }
}

fn category_from_status(status: u16) -> Option<ErrorCategory> {
    match status {
        401 | 403 => Some(ErrorCategory::PermissionError),
        413 => Some(ErrorCategory::FileTooLarge),
        507 => Some(ErrorCategory::StorageFull),
        502..=504 => Some(ErrorCategory::NetworkError),
        _ => None,
    }
}

/// Keyword scan used when nothing structured is available.
pub fn classify_message(message: &str) -> ErrorCategory {
    let message = message.to_lowercase();
    MESSAGE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| message.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::UploadFailed)
}

pub fn classify(error: &ApiError) -> ErrorCategory {
    if let Some(category) = error.code().and_then(category_from_code) {
        return category;
    }

    match error {
        ApiError::Network(_) | ApiError::Timeout(_) | ApiError::TaskTimeout { .. } => {
            ErrorCategory::NetworkError
        }
        ApiError::Cancelled => ErrorCategory::UploadFailed,
        ApiError::Http { status, message, .. } => {
            category_from_status(*status).unwrap_or_else(|| classify_message(message))
        }
        ApiError::InvalidResponse(message) | ApiError::InvalidRequest(message) => {
            classify_message(message)
        }
    }
}

/// Category for a background task that ran and did not succeed.
pub fn classify_task(code: Option<&str>, message: &str) -> ErrorCategory {
    code.and_then(category_from_code)
        .unwrap_or_else(|| classify_message(message))
}
