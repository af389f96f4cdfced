//! Pre-upload checks for staged files: size, accepted types, queue capacity.

use medrec_core::models::FilePayload;
use medrec_core::UploadConfig;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptedType {
    /// Lowercased extension without the dot.
    Extension(String),
    Mime(String),
    /// `image/*` stored as `image/`.
    MimePrefix(String),
}

impl AcceptedType {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        if raw.is_empty() {
            return None;
        }
        if let Some(prefix) = raw.strip_suffix("/*") {
            return Some(AcceptedType::MimePrefix(format!("{}/", prefix)));
        }
        if raw.contains('/') {
            return Some(AcceptedType::Mime(raw));
        }
        Some(AcceptedType::Extension(
            raw.trim_start_matches('.').to_string(),
        ))
    }

    fn matches(&self, extension: Option<&str>, mime: &str) -> bool {
        match self {
            AcceptedType::Extension(ext) => extension == Some(ext.as_str()),
            AcceptedType::Mime(expected) => mime == expected,
            AcceptedType::MimePrefix(prefix) => mime.starts_with(prefix.as_str()),
        }
    }
}

/// MIME type used for type checks: the declared one, or a guess from the
/// file name when the declaration is missing or generic.
pub fn effective_mime(file: &FilePayload) -> String {
    let declared = file.content_type.trim().to_lowercase();
    if declared.is_empty() || declared == "application/octet-stream" {
        mime_guess::from_path(&file.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    } else {
        declared
    }
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    accepted: Vec<AcceptedType>,
    max_size_bytes: u64,
    max_files: usize,
}

impl FileValidator {
    pub fn new(accepted_types: &[String], max_size_bytes: u64, max_files: usize) -> Self {
        Self {
            accepted: accepted_types
                .iter()
                .filter_map(|t| AcceptedType::parse(t))
                .collect(),
            max_size_bytes,
            max_files,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            &config.accepted_types,
            config.max_size_bytes,
            config.max_files,
        )
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn is_accepted(&self, file: &FilePayload) -> bool {
        if self.accepted.is_empty() {
            return true;
        }
        let extension = file.extension();
        let mime = effective_mime(file);
        self.accepted
            .iter()
            .any(|t| t.matches(extension.as_deref(), &mime))
    }

    /// Check a file against size and type limits.
    pub fn check_file(&self, file: &FilePayload) -> Result<(), ValidationError> {
        if file.size() > self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                name: file.name.clone(),
                size: file.size(),
                max: self.max_size_bytes,
            });
        }

        if !self.is_accepted(file) {
            return Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                content_type: effective_mime(file),
            });
        }

        Ok(())
    }

    /// Check that one more file fits next to `queued` already pending ones.
    pub fn check_capacity(&self, name: &str, queued: usize) -> Result<(), ValidationError> {
        if queued >= self.max_files {
            return Err(ValidationError::TooManyFiles {
                name: name.to_string(),
                max: self.max_files,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(types: &[&str]) -> FileValidator {
        let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        FileValidator::new(&types, 1024, 2)
    }

    #[test]
    fn test_extension_forms() {
        let v = validator(&[".PDF", "png"]);
        assert!(v.is_accepted(&FilePayload::new("a.pdf", "application/pdf", vec![1])));
        assert!(v.is_accepted(&FilePayload::new("b.PNG", "", vec![1])));
        assert!(!v.is_accepted(&FilePayload::new("c.exe", "", vec![1])));
    }

    #[test]
    fn test_mime_and_wildcard() {
        let v = validator(&["application/pdf", "image/*"]);
        assert!(v.is_accepted(&FilePayload::new("scan", "application/pdf", vec![1])));
        assert!(v.is_accepted(&FilePayload::new("photo.jpg", "image/jpeg", vec![1])));
        // Generic declaration falls back to a guess from the name.
        assert!(v.is_accepted(&FilePayload::new(
            "photo.png",
            "application/octet-stream",
            vec![1]
        )));
        assert!(!v.is_accepted(&FilePayload::new("notes.txt", "text/plain", vec![1])));
    }

    #[test]
    fn test_empty_allowlist_accepts_all() {
        let v = validator(&[]);
        assert!(v.is_accepted(&FilePayload::new("anything.bin", "", vec![1])));
    }

    #[test]
    fn test_size_checked_before_type() {
        let v = validator(&[".pdf"]);
        let big = FilePayload::new("huge.png", "image/png", vec![0u8; 2048]);
        assert!(matches!(
            v.check_file(&big),
            Err(ValidationError::FileTooLarge { size: 2048, max: 1024, .. })
        ));

        let wrong = FilePayload::new("small.png", "image/png", vec![0u8; 8]);
        assert!(matches!(
            v.check_file(&wrong),
            Err(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_capacity() {
        let v = validator(&[]);
        assert!(v.check_capacity("a", 1).is_ok());
        assert_eq!(
            v.check_capacity("a", 2),
            Err(ValidationError::TooManyFiles {
                name: "a".to_string(),
                max: 2
            })
        );
    }
}
