use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::StorageKind;
use models::project_file::GpsFix;
use services::{
    blob_store::{BlobStore, LocalBlobStore, MemoryBlobStore},
    clock::SystemClock,
    environment::StaticEnvironment,
    file_service::{FileService, ServiceSettings},
    pipeline::PipelineSettings,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting project-files with config: {:?}", cfg);

    // --- Blob store ---
    let blobs: Arc<dyn BlobStore> = match cfg.storage {
        StorageKind::Disk => {
            if !Path::new(&cfg.storage_dir).exists() {
                fs::create_dir_all(&cfg.storage_dir)?;
                tracing::info!("Created storage directory at {}", cfg.storage_dir);
            }
            Arc::new(LocalBlobStore::new(
                cfg.storage_dir.clone(),
                cfg.public_base_url.clone(),
            ))
        }
        StorageKind::Memory => {
            tracing::warn!("Memory storage selected; payloads are lost on restart");
            Arc::new(MemoryBlobStore::new(format!("localhost:{}", cfg.port)))
        }
    };

    // --- Initialize core service ---
    let settings = ServiceSettings {
        max_files: cfg.max_files,
        progress_retention: chrono::Duration::seconds(cfg.progress_retention_secs),
        pipeline: PipelineSettings {
            tick_interval: cfg.tick_interval(),
            fallback_location: GpsFix {
                latitude: cfg.fallback_latitude,
                longitude: cfg.fallback_longitude,
                accuracy: None,
            },
        },
    };
    let service = FileService::new(
        blobs,
        Arc::new(StaticEnvironment::default()),
        Arc::new(SystemClock),
        settings,
    );

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_body_bytes()).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
