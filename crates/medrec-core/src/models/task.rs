use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::file::FileRecord;

/// Consumption task states reported by the Paperless integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failure | TaskState::Revoked
        )
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::Started => write!(f, "STARTED"),
            TaskState::Retry => write!(f, "RETRY"),
            TaskState::Success => write!(f, "SUCCESS"),
            TaskState::Failure => write!(f, "FAILURE"),
            TaskState::Revoked => write!(f, "REVOKED"),
        }
    }
}

/// Response of the task status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub is_duplicate: bool,
}

impl TaskStatusResponse {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The consumer rejected the document as already present. Older servers
    /// only say so in the free-text result, so that is checked too.
    pub fn is_duplicate(&self) -> bool {
        if self.is_duplicate {
            return true;
        }
        if self
            .error_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("duplicate"))
        {
            return true;
        }
        self.status == TaskState::Failure
            && self
                .result
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains("duplicate"))
    }
}

/// Outcome of an upload whose completion is decided by a background task.
#[derive(Debug, Clone, Default)]
pub struct MonitoredUpload {
    /// False when the server settled the upload synchronously.
    pub task_monitored: bool,
    pub success: bool,
    pub is_duplicate: bool,
    pub task_result: Option<TaskStatusResponse>,
    pub file: Option<FileRecord>,
}

impl MonitoredUpload {
    /// Best available failure text for classification.
    pub fn failure_message(&self) -> String {
        self.task_result
            .as_ref()
            .and_then(|t| t.result.clone())
            .unwrap_or_else(|| "Document processing failed".to_string())
    }

    /// Structured error code reported by the task, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.task_result.as_ref().and_then(|t| t.error_type.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Request body is being transferred.
    Uploading,
    /// Transfer finished; waiting on server-side processing.
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub percent: u8,
}

/// Transport progress sink.
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: TaskState) -> TaskStatusResponse {
        TaskStatusResponse {
            task_id: "t-1".to_string(),
            status: state,
            result: None,
            error_type: None,
            document_id: None,
            is_duplicate: false,
        }
    }

    #[test]
    fn test_task_state_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Started.is_terminal());
        assert!(!TaskState::Retry.is_terminal());
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Failure.is_terminal());
        assert!(TaskState::Revoked.is_terminal());
    }

    #[test]
    fn test_duplicate_detection_sources() {
        let mut flagged = status(TaskState::Failure);
        flagged.is_duplicate = true;
        assert!(flagged.is_duplicate());

        let mut typed = status(TaskState::Failure);
        typed.error_type = Some("DUPLICATE".to_string());
        assert!(typed.is_duplicate());

        let mut texted = status(TaskState::Failure);
        texted.result = Some("scan.pdf: Not consuming scan.pdf: It is a duplicate of Invoice (#12)".to_string());
        assert!(texted.is_duplicate());

        let mut plain_failure = status(TaskState::Failure);
        plain_failure.result = Some("OCR failed".to_string());
        assert!(!plain_failure.is_duplicate());
    }

    #[test]
    fn test_task_status_deserialize() {
        let parsed: TaskStatusResponse =
            serde_json::from_str(r#"{"task_id":"abc","status":"SUCCESS","document_id":55}"#)
                .unwrap();
        assert_eq!(parsed.status, TaskState::Success);
        assert_eq!(parsed.document_id, Some(55));
        assert!(!parsed.is_duplicate());
    }
}
