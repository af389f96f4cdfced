//! Configuration module
//!
//! `ClientConfig` describes how to reach the medrec API, `UploadConfig` the
//! constraints a document manager applies to staged files. Both load from the
//! environment (after `.env`) with typed defaults and are checked by `validate`.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

// Common constants
const API_URL: &str = "http://localhost:8000";
const API_VERSION: &str = "v1";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const TASK_POLL_INTERVAL_MS: u64 = 1000;
const TASK_MAX_ATTEMPTS: u32 = 300;
const MAX_FILE_SIZE_MB: u64 = 100;
const MAX_FILES: usize = 10;
const PROGRESS_TICK_MS: u64 = 200;
const ACCEPTED_TYPES: &str =
    ".pdf,.jpg,.jpeg,.png,.tif,.tiff,.gif,.bmp,.txt,.csv,.doc,.docx,.xls,.xlsx,.xml,.json";

/// How a document manager may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentMode {
    /// Read-only listing of existing files.
    View,
    /// Existing entity: files can be added, uploaded and deleted.
    Edit,
    /// Entity not created yet: files are only staged.
    #[default]
    Create,
}

impl FromStr for DocumentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(DocumentMode::View),
            "edit" => Ok(DocumentMode::Edit),
            "create" => Ok(DocumentMode::Create),
            _ => Err(anyhow::anyhow!("Invalid document mode: {}", s)),
        }
    }
}

impl Display for DocumentMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DocumentMode::View => write!(f, "view"),
            DocumentMode::Edit => write!(f, "edit"),
            DocumentMode::Create => write!(f, "create"),
        }
    }
}

/// Connection settings for the medrec API.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub api_version: String,
    pub request_timeout_secs: u64,
    pub task_poll_interval_ms: u64,
    pub task_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            api_token: None,
            api_version: API_VERSION.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            task_poll_interval_ms: TASK_POLL_INTERVAL_MS,
            task_max_attempts: TASK_MAX_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("MEDREC_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| API_URL.to_string());

        let api_token = env::var("MEDREC_API_TOKEN")
            .or_else(|_| env::var("API_TOKEN"))
            .ok()
            .filter(|t| !t.trim().is_empty());

        let api_version =
            env::var("MEDREC_API_VERSION").unwrap_or_else(|_| API_VERSION.to_string());

        let request_timeout_secs = env::var("MEDREC_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .unwrap_or(REQUEST_TIMEOUT_SECS);

        let task_poll_interval_ms = env::var("MEDREC_TASK_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| TASK_POLL_INTERVAL_MS.to_string())
            .parse::<u64>()
            .unwrap_or(TASK_POLL_INTERVAL_MS);

        let task_max_attempts = env::var("MEDREC_TASK_MAX_ATTEMPTS")
            .unwrap_or_else(|_| TASK_MAX_ATTEMPTS.to_string())
            .parse::<u32>()
            .unwrap_or(TASK_MAX_ATTEMPTS);

        let config = Self {
            api_url,
            api_token,
            api_version,
            request_timeout_secs,
            task_poll_interval_ms,
            task_max_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "MEDREC_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }

        if self.api_version.trim().is_empty() || self.api_version.contains('/') {
            return Err(anyhow::anyhow!(
                "MEDREC_API_VERSION must be a single path segment such as 'v1'"
            ));
        }

        if self.task_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "MEDREC_TASK_POLL_INTERVAL_MS must be greater than 0"
            ));
        }

        if self.task_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "MEDREC_TASK_MAX_ATTEMPTS must be greater than 0"
            ));
        }

        Ok(())
    }

    /// API version prefix (e.g. "/api/v1").
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }
}

/// Constraints applied to files staged in a document manager.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub mode: DocumentMode,
    /// Extensions (`.pdf`), MIME types (`application/pdf`) or MIME wildcards
    /// (`image/*`). Empty accepts everything.
    pub accepted_types: Vec<String>,
    pub max_size_bytes: u64,
    pub max_files: usize,
    /// Upload files as soon as they are added when the entity already exists.
    pub auto_upload: bool,
    /// Interval of the cosmetic progress estimate for backends that report none.
    pub progress_tick_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            mode: DocumentMode::default(),
            accepted_types: parse_list(ACCEPTED_TYPES),
            max_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_files: MAX_FILES,
            auto_upload: false,
            progress_tick_ms: PROGRESS_TICK_MS,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let accepted_types =
            parse_list(&env::var("MEDREC_ACCEPTED_TYPES").unwrap_or_else(|_| ACCEPTED_TYPES.to_string()));

        let max_file_size_mb = env::var("MEDREC_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let max_files = env::var("MEDREC_MAX_FILES")
            .unwrap_or_else(|_| MAX_FILES.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILES);

        let auto_upload = env::var("MEDREC_AUTO_UPLOAD")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let progress_tick_ms = env::var("MEDREC_PROGRESS_TICK_MS")
            .unwrap_or_else(|_| PROGRESS_TICK_MS.to_string())
            .parse::<u64>()
            .unwrap_or(PROGRESS_TICK_MS);

        let config = Self {
            mode: DocumentMode::default(),
            accepted_types,
            max_size_bytes: max_file_size_mb * 1024 * 1024,
            max_files,
            auto_upload,
            progress_tick_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_mode(mut self, mode: DocumentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MEDREC_MAX_FILE_SIZE_MB must be greater than 0"
            ));
        }

        if self.max_files == 0 {
            return Err(anyhow::anyhow!("MEDREC_MAX_FILES must be greater than 0"));
        }

        if self.progress_tick_ms == 0 {
            return Err(anyhow::anyhow!(
                "MEDREC_PROGRESS_TICK_MS must be greater than 0"
            ));
        }

        if let Some(bad) = self
            .accepted_types
            .iter()
            .find(|t| t.contains('/') && t.split('/').any(str::is_empty))
        {
            return Err(anyhow::anyhow!(
                "MEDREC_ACCEPTED_TYPES contains a malformed MIME type: '{}'",
                bad
            ));
        }

        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
