//! Error types module
//!
//! `ApiError` is what the entity file API boundary reports. It keeps the
//! server's structured error code next to the HTTP status so the upload core
//! can classify failures without parsing message text first.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like duplicates
    Debug,
    /// Warning level - for problems the user can fix
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Self-description of an error for logging and retry decisions.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NETWORK_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the same request may succeed if sent again
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("API request failed with status {status}: {message}")]
    Http {
        status: u16,
        /// Structured code from the response body, when the server sent one.
        code: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Task {task_id} did not finish after {attempts} status checks")]
    TaskTimeout { task_id: String, attempts: u32 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Message without the status prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl ErrorMetadata for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Http { .. } => "HTTP_ERROR",
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::TaskTimeout { .. } => "TASK_TIMEOUT",
            ApiError::Cancelled => "CANCELLED",
            ApiError::InvalidResponse(_) => "INVALID_RESPONSE",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => *status >= 500 || *status == 429,
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::TaskTimeout { .. } => true,
            ApiError::Cancelled | ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => {
                false
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ApiError::Cancelled => LogLevel::Debug,
            ApiError::Http { status, .. } if *status < 500 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
