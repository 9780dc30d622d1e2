//! QuickShare CLI: operator access to the upload lifecycle coordinator.
//!
//! Reads configuration from the environment (DATABASE_URL, STORAGE_BACKEND,
//! S3_BUCKET, S3_REGION, ...) and talks to the catalog and blob store directly.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quickshare_cli::{error_payload, init_tracing, log_failure, print_json};
use quickshare_core::{AppError, Config, UploadDraft};
use quickshare_db::{run_migrations, setup_database, UploadObjectRepository};
use quickshare_services::{create_storage, CleanupService, UploadService};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quickshare", about = "QuickShare upload lifecycle CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Register a pending upload and print its presigned upload URL
    Initiate {
        #[arg(long)]
        file_name: String,
        /// Declared size in bytes
        #[arg(long)]
        file_size: i64,
        #[arg(long)]
        mime_type: String,
        /// Absolute expiry (RFC 3339); defaults to 24 hours from now
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Mark an upload completed once its file is in storage
    Confirm {
        /// Upload ID
        id: String,
    },
    /// Show the catalog record for an upload
    Show {
        /// Upload ID
        id: String,
    },
    /// Print the download URL of a completed upload
    DownloadUrl {
        /// Upload ID
        id: String,
    },
    /// Delete an upload from storage and the catalog
    Delete {
        /// Upload ID
        id: String,
    },
    /// Purge pending uploads that expired without being confirmed
    Cleanup {
        /// Keep running, sweeping every CLEANUP_INTERVAL_SECS (requires CLEANUP_ENABLED=true)
        #[arg(long)]
        watch: bool,
    },
}

/// Print a successful result; hand a coordinator error back for rendering.
fn emit<T: Serialize>(result: Result<T, AppError>) -> anyhow::Result<Result<(), AppError>> {
    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(Ok(()))
        }
        Err(err) => Ok(Err(err)),
    }
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<Result<(), AppError>> {
    let pool = setup_database(config).await?;

    if let Commands::Migrate = command {
        run_migrations(&pool).await?;
        print_json(&serde_json::json!({ "success": true, "message": "Migrations applied" }))?;
        return Ok(Ok(()));
    }

    let repository = Arc::new(UploadObjectRepository::new(pool));
    let storage = create_storage(config)
        .await
        .context("Failed to create storage backend")?;
    let service = UploadService::new(repository.clone(), storage.clone());

    match command {
        Commands::Migrate => Ok(Ok(())),
        Commands::Initiate {
            file_name,
            file_size,
            mime_type,
            expires_at,
        } => {
            let mut draft = UploadDraft::new(file_name, file_size, mime_type);
            draft.expires_at = expires_at;
            emit(service.initiate_upload(draft).await)
        }
        Commands::Confirm { id } => emit(service.confirm_upload(&id).await),
        Commands::Show { id } => emit(service.get_upload(&id).await),
        Commands::DownloadUrl { id } => emit(
            service
                .get_download_url(&id)
                .await
                .map(|url| serde_json::json!({ "id": id, "download_url": url })),
        ),
        Commands::Delete { id } => emit(service.delete_upload_object(&id).await.map(|()| {
            serde_json::json!({ "success": true, "message": format!("Upload {} deleted", id) })
        })),
        Commands::Cleanup { watch: false } => {
            let cleanup = CleanupService::from_config(config, repository, storage);
            emit(cleanup.purge_expired_pending().await)
        }
        Commands::Cleanup { watch: true } => {
            if !config.cleanup_enabled() {
                anyhow::bail!("Scheduled cleanup is disabled; set CLEANUP_ENABLED=true");
            }
            let cleanup = Arc::new(CleanupService::from_config(config, repository, storage));
            let handle = cleanup.start();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutting down cleanup task");
            handle.abort();
            Ok(Ok(()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match run(cli.command, &config).await? {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            log_failure(&err);
            eprintln!("{}", serde_json::to_string_pretty(&error_payload(&err))?);
            Ok(ExitCode::FAILURE)
        }
    }
}
