use std::path::Path;

use anyhow::Context;
use medrec_core::models::FilePayload;
use medrec_uploads::DocumentManagerObserver;
use serde::Serialize;

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Read a local file into an upload payload, guessing its MIME type from the name.
pub async fn read_payload(path: &Path) -> anyhow::Result<FilePayload> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(FilePayload::new(name, content_type, data))
}

/// Observer that reports manager notifications through tracing.
pub struct LogObserver;

impl DocumentManagerObserver for LogObserver {
    fn on_file_count_change(&self, count: usize) {
        tracing::debug!(count = count, "File count changed");
    }

    fn on_error(&self, message: &str) {
        tracing::warn!(message = %message, "Document manager error");
    }
}
