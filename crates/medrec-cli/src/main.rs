//! medrec CLI: manage the attachments of a medrec record from the shell.
//!
//! Set MEDREC_API_URL and MEDREC_API_TOKEN. Upload limits come from
//! MEDREC_ACCEPTED_TYPES, MEDREC_MAX_FILE_SIZE_MB and MEDREC_MAX_FILES.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use medrec_api_client::ApiClient;
use medrec_cli::{init_tracing, print_json, read_payload, LogObserver};
use medrec_core::models::EntityType;
use medrec_core::{DocumentMode, EntityFileApi, StorageBackend, UploadConfig};
use medrec_uploads::{DocumentManager, UploadError};

#[derive(Parser)]
#[command(name = "medrec", about = "Medrec attachment CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The record whose attachments are managed.
#[derive(Args)]
struct EntityArgs {
    /// Entity type: insurance, pharmacy, practitioner, medication, visit,
    /// equipment, lab-result, procedure
    #[arg(long)]
    entity_type: EntityType,
    /// Entity ID
    #[arg(long)]
    entity_id: i64,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files attached to a record
    List {
        #[command(flatten)]
        entity: EntityArgs,
    },
    /// Upload one or more files to a record
    Upload {
        #[command(flatten)]
        entity: EntityArgs,
        /// Storage backend: local or paperless (default: server default)
        #[arg(long)]
        backend: Option<StorageBackend>,
        /// Description applied to every file
        #[arg(long, default_value = "")]
        description: String,
        /// Paths of the files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete files from a record
    Delete {
        #[command(flatten)]
        entity: EntityArgs,
        /// File IDs
        #[arg(required = true)]
        file_ids: Vec<i64>,
    },
    /// Download a file into a directory
    Download {
        #[command(flatten)]
        entity: EntityArgs,
        /// File ID
        file_id: i64,
        /// Output directory
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Show the content type and size of a file
    View {
        #[command(flatten)]
        entity: EntityArgs,
        /// File ID
        file_id: i64,
    },
    /// Show storage backend settings
    Settings,
}

fn open_manager(
    api: &Arc<dyn EntityFileApi>,
    config: &UploadConfig,
    mode: DocumentMode,
    entity: &EntityArgs,
) -> anyhow::Result<DocumentManager> {
    DocumentManager::new(
        api.clone(),
        entity.entity_type,
        Some(entity.entity_id),
        config.clone().with_mode(mode),
        Arc::new(LogObserver),
    )
    .context("Failed to open document manager")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set MEDREC_API_URL and MEDREC_API_TOKEN")?;
    let api: Arc<dyn EntityFileApi> = Arc::new(client);
    let config = UploadConfig::from_env().context("Invalid upload configuration")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::List { entity } => {
            let manager = open_manager(&api, &config, DocumentMode::View, &entity)?;
            manager.load_files().await?;
            print_json(&manager.file_views().await)?;
        }
        Commands::Upload {
            entity,
            backend,
            description,
            files,
        } => {
            let manager = open_manager(&api, &config, DocumentMode::Edit, &entity)?;
            if let Err(e) = manager.load_settings().await {
                tracing::warn!(error = %e, "Using local storage");
            }
            manager.select_backend(backend).await?;

            let mut payloads = Vec::with_capacity(files.len());
            for path in &files {
                payloads.push((read_payload(path).await?, description.clone()));
            }

            let report = manager.add_files(payloads).await?;
            for rejected in &report.rejected {
                eprintln!("Skipped: {}", rejected);
            }

            let result = manager.upload_pending_files(entity.entity_id).await;
            let records = manager.last_batch_records().await;
            match result {
                Ok(outcome) => {
                    print_json(&serde_json::json!({ "outcome": outcome, "files": records }))?;
                }
                Err(UploadError::BatchFailed { outcome, failures }) => {
                    print_json(&serde_json::json!({
                        "outcome": outcome,
                        "files": records,
                        "failures": failures,
                    }))?;
                    anyhow::bail!("{} of {} files failed to upload", outcome.failed, outcome.total());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Delete { entity, file_ids } => {
            let manager = open_manager(&api, &config, DocumentMode::Edit, &entity)?;
            manager.load_files().await?;
            for id in &file_ids {
                manager.mark_for_deletion(*id).await?;
            }

            let report = manager.delete_marked_files().await?;
            print_json(&report)?;
            if !report.is_success() {
                anyhow::bail!("{} files could not be deleted", report.failures.len());
            }
        }
        Commands::Download {
            entity,
            file_id,
            output,
        } => {
            let manager = open_manager(&api, &config, DocumentMode::View, &entity)?;
            manager.load_files().await?;
            let path = manager.download_file(file_id, &output).await?;
            print_json(&serde_json::json!({ "file_id": file_id, "path": path }))?;
        }
        Commands::View { entity, file_id } => {
            let manager = open_manager(&api, &config, DocumentMode::View, &entity)?;
            manager.load_files().await?;
            let file = manager.view_file(file_id).await?;
            print_json(&serde_json::json!({
                "file_id": file_id,
                "file_name": file.file_name,
                "content_type": file.content_type,
                "size": file.data.len(),
            }))?;
        }
        Commands::Settings => {
            let settings = api.get_storage_backend_settings().await?;
            print_json(&serde_json::json!({
                "settings": settings,
                "effective_default": settings.effective_default(),
            }))?;
        }
    }

    Ok(())
}
