//! Per-slot upload records, one for each file in the pending queue.

use medrec_core::models::{ErrorCategory, UploadIssue, UploadRecord, UploadStatus};

use crate::error::TransitionError;

/// Partial update of one upload record. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub error: Option<UploadIssue>,
}

impl RecordPatch {
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(percent: u8) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress = Some(percent);
        self
    }

    pub fn completed() -> Self {
        Self::status(UploadStatus::Completed)
    }

    pub fn duplicate(notice: UploadIssue) -> Self {
        Self {
            status: Some(UploadStatus::CompletedDuplicate),
            error: Some(notice),
            ..Self::default()
        }
    }

    pub fn failed(issue: UploadIssue) -> Self {
        Self {
            status: Some(UploadStatus::Failed),
            error: Some(issue),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    records: Vec<UploadRecord>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to `count` pending slots at 0%.
    pub fn init(&mut self, count: usize) {
        self.records = vec![UploadRecord::default(); count];
    }

    /// Track a newly staged file as a pending slot at the end.
    pub fn push_pending(&mut self) {
        self.records.push(UploadRecord::default());
    }

    /// Drop the slot of a removed file so later slots shift with the queue.
    pub fn remove(&mut self, index: usize) -> Option<UploadRecord> {
        (index < self.records.len()).then(|| self.records.remove(index))
    }

    /// Apply a patch to one slot.
    ///
    /// Progress never goes backwards while a slot is active. Completed and
    /// duplicate slots are pinned at 100, failed slots keep their last value.
    pub fn set(&mut self, index: usize, patch: RecordPatch) -> Result<(), TransitionError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(TransitionError::UnknownSlot(index))?;

        if record.status.is_terminal() {
            return Err(TransitionError::Terminal {
                index,
                status: record.status,
            });
        }

        let next = patch.status.unwrap_or(record.status);
        if !record.status.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                index,
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        match next {
            UploadStatus::Completed | UploadStatus::CompletedDuplicate => record.progress = 100,
            UploadStatus::Failed => {}
            _ => {
                if let Some(percent) = patch.progress {
                    record.progress = record.progress.max(percent.min(100));
                }
            }
        }

        match next {
            UploadStatus::Failed => {
                record.error = Some(patch.error.unwrap_or_else(|| UploadIssue {
                    category: ErrorCategory::UploadFailed,
                    message: "Upload failed".to_string(),
                }));
            }
            UploadStatus::CompletedDuplicate => record.error = patch.error,
            _ => {}
        }

        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&UploadRecord> {
        self.records.get(index)
    }

    /// Status of a slot; slots beyond the tracked range are still pending.
    pub fn status_of(&self, index: usize) -> UploadStatus {
        self.records
            .get(index)
            .map(|r| r.status)
            .unwrap_or(UploadStatus::Pending)
    }

    pub fn snapshot(&self) -> Vec<UploadRecord> {
        self.records.clone()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
