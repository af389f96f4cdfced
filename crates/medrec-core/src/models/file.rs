use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

/// Parent record kinds that can own attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Insurance,
    Pharmacy,
    Practitioner,
    Medication,
    Visit,
    Equipment,
    LabResult,
    Procedure,
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EntityType::Insurance => write!(f, "insurance"),
            EntityType::Pharmacy => write!(f, "pharmacy"),
            EntityType::Practitioner => write!(f, "practitioner"),
            EntityType::Medication => write!(f, "medication"),
            EntityType::Visit => write!(f, "visit"),
            EntityType::Equipment => write!(f, "equipment"),
            EntityType::LabResult => write!(f, "lab-result"),
            EntityType::Procedure => write!(f, "procedure"),
        }
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "insurance" => Ok(EntityType::Insurance),
            "pharmacy" => Ok(EntityType::Pharmacy),
            "practitioner" => Ok(EntityType::Practitioner),
            "medication" => Ok(EntityType::Medication),
            "visit" => Ok(EntityType::Visit),
            "equipment" => Ok(EntityType::Equipment),
            "lab-result" => Ok(EntityType::LabResult),
            "procedure" => Ok(EntityType::Procedure),
            _ => Err(anyhow::anyhow!("Invalid entity type: {}", s)),
        }
    }
}

/// An attachment already stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub storage_backend: StorageBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paperless_document_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// File contents staged on the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension without the leading dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }
}

/// Everything the transport needs to submit one file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub file: FilePayload,
    pub description: String,
    /// Backend-specific extras forwarded verbatim (e.g. Paperless tags).
    pub extra: serde_json::Value,
    pub backend: StorageBackend,
}

/// Downloaded file contents.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}
