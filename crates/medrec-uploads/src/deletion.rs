//! Deferred deletion of existing files.
//!
//! Marks are local until committed; a file whose delete call fails stays
//! marked so the user can retry.

use std::collections::BTreeSet;

use futures::future::join_all;
use medrec_core::models::BatchOutcome;
use medrec_core::{ApiError, EntityFileApi};
use serde::Serialize;

#[derive(Debug, Default, Clone)]
pub struct DeletionMarks {
    marked: BTreeSet<i64>,
}

impl DeletionMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the file was not already marked.
    pub fn mark(&mut self, file_id: i64) -> bool {
        self.marked.insert(file_id)
    }

    pub fn unmark(&mut self, file_id: i64) -> bool {
        self.marked.remove(&file_id)
    }

    pub fn is_marked(&self, file_id: i64) -> bool {
        self.marked.contains(&file_id)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.marked.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    pub fn clear(&mut self) {
        self.marked.clear();
    }

    /// Drop the marks of files the report says are gone.
    pub fn apply(&mut self, report: &DeletionReport) {
        for id in &report.deleted {
            self.marked.remove(id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    pub file_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub deleted: Vec<i64>,
    pub failures: Vec<DeletionFailure>,
}

impl DeletionReport {
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome {
            succeeded: self.deleted.len(),
            duplicates: 0,
            failed: self.failures.len(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Issue one delete per id concurrently. Individual failures are collected,
/// never propagated.
pub async fn commit(api: &dyn EntityFileApi, ids: &[i64]) -> DeletionReport {
    let results: Vec<(i64, Result<(), ApiError>)> = join_all(
        ids.iter()
            .map(|&id| async move { (id, api.delete_entity_file(id).await) }),
    )
    .await;

    let mut report = DeletionReport::default();
    for (file_id, result) in results {
        match result {
            Ok(()) => {
                tracing::info!(file_id = file_id, "File deleted");
                report.deleted.push(file_id);
            }
            Err(e) => {
                tracing::warn!(file_id = file_id, error = %e, "Failed to delete file");
                report.failures.push(DeletionFailure {
                    file_id,
                    message: e.message(),
                });
            }
        }
    }
    report
}
