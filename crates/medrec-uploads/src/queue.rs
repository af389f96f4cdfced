//! Pending file queue.
//!
//! Files staged before their entity exists (create mode) or queued for an
//! additive upload (edit mode). Upload records are keyed by queue position, so
//! the queue refuses removals and description edits while it is locked for a
//! batch.

use std::fmt::{Display, Formatter, Result as FmtResult};

use medrec_core::models::FilePayload;

use crate::error::ValidationError;
use crate::validation::FileValidator;

/// Locally generated handle of a staged file. Never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingFileId(u64);

impl Display for PendingFileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "pending-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PendingFile {
    pub id: PendingFileId,
    pub file: FilePayload,
    pub description: String,
}

#[derive(Debug)]
pub struct PendingFileQueue {
    files: Vec<PendingFile>,
    next_id: u64,
    validator: FileValidator,
    locked: bool,
}

impl PendingFileQueue {
    pub fn new(validator: FileValidator) -> Self {
        Self {
            files: Vec::new(),
            next_id: 1,
            validator,
            locked: false,
        }
    }

    /// Validate and append a file. Nothing is queued on error.
    pub fn add(
        &mut self,
        file: FilePayload,
        description: impl Into<String>,
    ) -> Result<PendingFileId, ValidationError> {
        self.validator.check_file(&file)?;
        self.validator.check_capacity(&file.name, self.files.len())?;

        let id = PendingFileId(self.next_id);
        self.next_id += 1;
        self.files.push(PendingFile {
            id,
            file,
            description: description.into(),
        });
        Ok(id)
    }

    /// Remove a staged file. Returns false if it is unknown or the queue is locked.
    pub fn remove(&mut self, id: PendingFileId) -> bool {
        if self.locked {
            return false;
        }
        match self.position(id) {
            Some(index) => {
                self.files.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn update_description(&mut self, id: PendingFileId, text: impl Into<String>) -> bool {
        if self.locked {
            return false;
        }
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.description = text.into();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn position(&self, id: PendingFileId) -> Option<usize> {
        self.files.iter().position(|f| f.id == id)
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn queue(max_files: usize) -> PendingFileQueue {
        PendingFileQueue::new(FileValidator::new(&[".pdf".to_string()], 100, max_files))
    }

    fn pdf(name: &str) -> FilePayload {
        FilePayload::new(name, "application/pdf", vec![0u8; 10])
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let mut q = queue(10);
        let mut seen = HashSet::new();
        for i in 0..5 {
            let id = q.add(pdf(&format!("{}.pdf", i)), "").unwrap();
            assert!(seen.insert(id));
            assert_eq!(q.len(), i + 1);
        }

        // Ids are not reused after removal.
        let last = q.list()[4].id;
        assert!(q.remove(last));
        let next = q.add(pdf("again.pdf"), "").unwrap();
        assert!(!seen.contains(&next));
    }

    #[test]
    fn test_rejected_add_leaves_queue_unchanged() {
        let mut q = queue(1);
        let oversize = FilePayload::new("big.pdf", "application/pdf", vec![0u8; 101]);
        assert!(q.add(oversize, "").is_err());
        assert!(q.add(FilePayload::new("x.png", "image/png", vec![1]), "").is_err());
        assert!(q.is_empty());

        q.add(pdf("a.pdf"), "").unwrap();
        assert!(matches!(
            q.add(pdf("b.pdf"), ""),
            Err(ValidationError::TooManyFiles { max: 1, .. })
        ));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_order_and_description_updates() {
        let mut q = queue(10);
        let a = q.add(pdf("a.pdf"), "first").unwrap();
        let b = q.add(pdf("b.pdf"), "second").unwrap();

        assert!(q.update_description(b, "edited"));
        assert_eq!(q.position(a), Some(0));
        assert_eq!(q.position(b), Some(1));
        assert_eq!(q.list()[1].description, "edited");
        assert!(!q.update_description(PendingFileId(99), "nope"));
    }

    #[test]
    fn test_locked_queue_refuses_mutation() {
        let mut q = queue(10);
        let a = q.add(pdf("a.pdf"), "first").unwrap();
        q.set_locked(true);

        assert!(!q.remove(a));
        assert!(!q.update_description(a, "changed"));
        assert_eq!(q.list()[0].description, "first");

        q.set_locked(false);
        assert!(q.remove(a));
    }
}
