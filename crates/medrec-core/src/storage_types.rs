use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage backend types
///
/// `Local` stores the file on the medrec server. `Paperless` hands it to a
/// Paperless-ngx instance, which consumes it asynchronously (OCR, indexing,
/// duplicate detection) behind a monitored task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Paperless,
}

impl StorageBackend {
    /// Whether uploads to this backend settle through a background task
    /// rather than with the HTTP response.
    pub fn is_task_monitored(&self) -> bool {
        matches!(self, StorageBackend::Paperless)
    }

    /// What to tell the user when this backend cannot take uploads.
    pub fn unavailable_guidance(&self) -> &'static str {
        match self {
            StorageBackend::Local => "Local storage is unavailable. Contact your administrator.",
            StorageBackend::Paperless => {
                "Paperless is not available. Enable and connect the integration in Settings, or upload to local storage."
            }
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "paperless" => Ok(StorageBackend::Paperless),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Paperless => write!(f, "paperless"),
        }
    }
}

/// Server-reported storage capabilities.
///
/// Re-derived from the server on every load; never persisted client-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBackendSettings {
    #[serde(rename = "paperless_enabled", default)]
    pub enabled: bool,
    #[serde(rename = "paperless_connected", default)]
    pub connected: bool,
    #[serde(rename = "default_storage_backend", default)]
    pub default_backend: StorageBackend,
}

impl StorageBackendSettings {
    /// Paperless can only take uploads when it is both enabled and reachable.
    pub fn paperless_available(&self) -> bool {
        self.enabled && self.connected
    }

    pub fn supports(&self, backend: StorageBackend) -> bool {
        match backend {
            StorageBackend::Local => true,
            StorageBackend::Paperless => self.paperless_available(),
        }
    }

    /// Backend used when the user made no explicit choice.
    pub fn effective_default(&self) -> StorageBackend {
        if self.supports(self.default_backend) {
            self.default_backend
        } else {
            StorageBackend::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_round_trip_strings() {
        assert_eq!("LOCAL".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!(
            "paperless".parse::<StorageBackend>().unwrap(),
            StorageBackend::Paperless
        );
        assert!("s3".parse::<StorageBackend>().is_err());
        assert_eq!(StorageBackend::Paperless.to_string(), "paperless");
    }

    #[test]
    fn test_unavailable_guidance_points_to_settings() {
        assert!(StorageBackend::Paperless
            .unavailable_guidance()
            .contains("Enable and connect the integration in Settings"));
        assert!(!StorageBackend::Local
            .unavailable_guidance()
            .contains("Paperless"));
    }

    #[test]
    fn test_effective_default_falls_back_to_local() {
        let disconnected = StorageBackendSettings {
            enabled: true,
            connected: false,
            default_backend: StorageBackend::Paperless,
        };
        assert_eq!(disconnected.effective_default(), StorageBackend::Local);

        let connected = StorageBackendSettings {
            connected: true,
            ..disconnected
        };
        assert_eq!(connected.effective_default(), StorageBackend::Paperless);
    }

    #[test]
    fn test_settings_deserialize_server_shape() {
        let settings: StorageBackendSettings = serde_json::from_str(
            r#"{"paperless_enabled":true,"paperless_connected":true,"default_storage_backend":"paperless"}"#,
        )
        .unwrap();
        assert!(settings.paperless_available());
        assert_eq!(settings.default_backend, StorageBackend::Paperless);

        let empty: StorageBackendSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, StorageBackendSettings::default());
    }
}
