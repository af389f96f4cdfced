//! Medrec Core Library
//!
//! Domain models, error types, configuration and the entity file API trait
//! shared by the HTTP client, the upload core and the CLI.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use api::EntityFileApi;
pub use config::{ClientConfig, DocumentMode, UploadConfig};
pub use error::{ApiError, ApiResult, ErrorMetadata, LogLevel};
pub use storage_types::{StorageBackend, StorageBackendSettings};
