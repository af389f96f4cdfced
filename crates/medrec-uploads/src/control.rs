//! Handle given to the page that owns a document manager.
//!
//! The owning page creates the parent record and then asks the manager to
//! upload what the user staged. It does so through an [`UploadControl`], which
//! reads the manager's live state on every call, so counts can never be stale.

use std::sync::{Arc, Weak};

use medrec_core::models::BatchOutcome;

use crate::deletion::DeletionReport;
use crate::error::UploadError;
use crate::state::Shared;

/// Notifications from a document manager to its owner.
pub trait DocumentManagerObserver: Send + Sync {
    /// Visible existing files (not marked for deletion) plus pending files.
    fn on_file_count_change(&self, _count: usize) {}

    fn on_error(&self, _message: &str) {}

    /// Called once, when the manager is created.
    fn on_control_registered(&self, _control: UploadControl) {}
}

/// Observer that ignores everything.
pub struct NoOpObserver;

impl DocumentManagerObserver for NoOpObserver {}

/// Cloneable handle onto a document manager's uploads.
///
/// Holds a weak reference: once the manager is dropped, operations return
/// [`UploadError::Closed`] and queries report an empty queue.
#[derive(Clone)]
pub struct UploadControl {
    shared: Weak<Shared>,
}

impl UploadControl {
    pub(crate) fn new(shared: &Arc<Shared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    fn shared(&self) -> Result<Arc<Shared>, UploadError> {
        self.shared.upgrade().ok_or(UploadError::Closed)
    }

    pub async fn upload_pending_files(&self, entity_id: i64) -> Result<BatchOutcome, UploadError> {
        self.shared()?.upload_pending_files(entity_id).await
    }

    pub async fn pending_files_count(&self) -> usize {
        match self.shared.upgrade() {
            Some(shared) => shared.pending_count().await,
            None => 0,
        }
    }

    pub async fn has_pending_files(&self) -> bool {
        self.pending_files_count().await > 0
    }

    pub async fn clear_pending_files(&self) -> Result<(), UploadError> {
        self.shared()?.clear_pending().await
    }

    pub async fn delete_marked_files(&self) -> Result<DeletionReport, UploadError> {
        self.shared()?.delete_marked_files().await
    }

    /// True while a batch or a deletion commit is in flight.
    pub async fn is_blocking(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.is_blocking().await,
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.strong_count() == 0
    }
}
