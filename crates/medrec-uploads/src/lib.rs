//! Upload coordination for entity attachments.
//!
//! A [`DocumentManager`] stages files for a parent record, uploads them in
//! concurrent batches with per-file progress, and commits deferred deletions.
//! The page that owns the parent record drives uploads through an
//! [`UploadControl`] handed to its [`DocumentManagerObserver`].

pub mod classify;
pub mod control;
pub mod deletion;
pub mod error;
pub mod estimator;
pub mod manager;
pub mod orchestrator;
pub mod progress;
pub mod queue;
mod state;
pub mod validation;

pub use control::{DocumentManagerObserver, NoOpObserver, UploadControl};
pub use deletion::{DeletionFailure, DeletionMarks, DeletionReport};
pub use error::{FailedUpload, TransitionError, UploadError, ValidationError};
pub use estimator::ProgressEstimator;
pub use manager::{AddFilesReport, DocumentManager, FileView};
pub use orchestrator::{FileOutcome, UploadOrchestrator};
pub use progress::{ProgressTracker, RecordPatch};
pub use queue::{PendingFile, PendingFileId, PendingFileQueue};
pub use validation::FileValidator;
