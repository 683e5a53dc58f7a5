//! Upload pipeline: progress ticks → enrichment → tagging → store → register.
//!
//! Each staged file runs as its own future. A batch drives all of them
//! together on the calling task, so files finish in whatever order their
//! stores complete and the registry sees them in completion order.

use crate::{
    models::{
        category::FileCategory,
        progress::{
            ProgressError, ProgressEvent, TICK_CEILING, TICK_STEP, UploadProgress, UploadStatus,
        },
        project_file::{FileMetadata, GpsFix, ProjectFile},
    },
    services::{
        blob_store::{BlobError, BlobStore},
        clock::Clock,
        environment::EnvironmentProvider,
        intake::StagedFile,
        progress_board::ProgressBoard,
        registry::FileRegistry,
        tagging::generate_tags,
    },
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Message shown on a progress entry when its upload fails.
pub const FAILURE_MESSAGE: &str = "Upload failed";

const MAX_NAME_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Delay between progress ticks.
    pub tick_interval: Duration,
    /// Used when neither the client nor the provider knows the location.
    pub fallback_location: GpsFix,
}

/// Per-batch inputs shared by every file in the batch.
#[derive(Clone, Debug)]
pub struct BatchContext {
    pub project_id: String,
    /// Position reported by the uploading device, if it sent one.
    pub reported_location: Option<GpsFix>,
}

#[derive(Serialize, Debug, Default)]
pub struct BatchReport {
    /// Registered files, in completion order.
    pub uploaded: Vec<ProjectFile>,
    pub failed: Vec<UploadProgress>,
}

#[derive(Clone)]
pub struct UploadPipeline {
    blobs: Arc<dyn BlobStore>,
    environment: Arc<dyn EnvironmentProvider>,
    clock: Arc<dyn Clock>,
    registry: Arc<RwLock<FileRegistry>>,
    progress: ProgressBoard,
    settings: PipelineSettings,
    completions: Arc<AtomicU64>,
}

impl UploadPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        environment: Arc<dyn EnvironmentProvider>,
        clock: Arc<dyn Clock>,
        registry: Arc<RwLock<FileRegistry>>,
        progress: ProgressBoard,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            blobs,
            environment,
            clock,
            registry,
            progress,
            settings,
            completions: Arc::default(),
        }
    }

    /// Run every staged file through the pipeline. Files succeed or fail
    /// independently; nothing is rolled back across the batch.
    ///
    /// Each file runs on its own task, so dropping the returned future (a
    /// client hanging up mid-request) does not stop uploads already started.
    pub async fn run_batch(&self, ctx: &BatchContext, files: Vec<StagedFile>) -> BatchReport {
        let mut names = Vec::with_capacity(files.len());
        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            let pipeline = self.clone();
            let ctx = ctx.clone();
            names.push(file.original_name.clone());
            handles.push(tokio::spawn(
                async move { pipeline.run_one(&ctx, file).await },
            ));
        }
        let outcomes = join_all(handles).await;

        // join_all keeps input order; successes are re-sorted into completion order.
        let mut report = BatchReport::default();
        let mut completed = Vec::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok((record, sequence))) => completed.push((sequence, record)),
                Ok(Err(progress)) => report.failed.push(progress),
                Err(err) => error!(file = %name, error = %err, "upload task aborted"),
            }
        }
        completed.sort_by_key(|(sequence, _)| *sequence);
        report.uploaded = completed.into_iter().map(|(_, record)| record).collect();
        report
    }

    async fn run_one(
        &self,
        ctx: &BatchContext,
        file: StagedFile,
    ) -> Result<(ProjectFile, u64), UploadProgress> {
        let upload_id = Uuid::new_v4();
        self.progress
            .start(upload_id, &file.original_name, self.clock.now())
            .await;
        debug!(%upload_id, file = %file.original_name, "upload started");

        match self.drive(upload_id, ctx, &file).await {
            Ok(pair) => Ok(pair),
            Err(err) => {
                error!(%upload_id, file = %file.original_name, error = %err, "upload failed");
                Err(self.mark_failed(upload_id, &file.original_name).await)
            }
        }
    }

    async fn drive(
        &self,
        upload_id: Uuid,
        ctx: &BatchContext,
        file: &StagedFile,
    ) -> Result<(ProjectFile, u64), PipelineError> {
        for _ in 0..(TICK_CEILING / TICK_STEP) {
            self.clock.sleep(self.settings.tick_interval).await;
            self.progress
                .apply(upload_id, ProgressEvent::Tick, self.clock.now())
                .await?;
        }

        let metadata = self.enrich(ctx, file).await;
        let now = self.clock.now();
        let tags = generate_tags(
            file.category,
            file.phase,
            now.date_naive(),
            metadata.weather.as_ref(),
        );

        let id = Uuid::new_v4();
        let file_name = storage_safe_name(&file.original_name, now);
        let storage_key = format!("{}/{}/{}", key_segment(&ctx.project_id), id, file_name);
        let stored = self
            .blobs
            .put(&storage_key, &file.mime_type, file.bytes.clone())
            .await?;

        let mut record = ProjectFile {
            id,
            project_id: ctx.project_id.clone(),
            original_name: file.original_name.clone(),
            file_name,
            file_size: file.size(),
            mime_type: file.mime_type.clone(),
            category: file.category,
            phase: file.phase,
            tags,
            metadata,
            thumbnail_url: None,
            url: stored.url,
            storage_key,
            checksum: stored.checksum,
            is_public: file.category == FileCategory::ProgressPhotos,
            created_at: now,
            updated_at: now,
            archived_at: None,
        };
        if record.is_image() {
            record.thumbnail_url = Some(record.url.clone());
        }

        if let Err(err) = self
            .progress
            .apply(upload_id, ProgressEvent::Complete, now)
            .await
        {
            if let Err(cleanup) = self.blobs.delete(&record.storage_key).await {
                warn!(key = %record.storage_key, error = %cleanup, "could not remove orphaned blob");
            }
            return Err(err.into());
        }

        let (sequence, registered) = {
            let mut registry = self.registry.write().await;
            registry.append(record.clone());
            (self.completions.fetch_add(1, Ordering::SeqCst), registry.len())
        };
        info!(
            id = %record.id,
            registered,
            file = %record.original_name,
            category = %record.category,
            "upload completed"
        );
        Ok((record, sequence))
    }

    /// Attach location and weather for categories that want them. Never fails;
    /// missing pieces are logged and left out.
    async fn enrich(&self, ctx: &BatchContext, file: &StagedFile) -> FileMetadata {
        let mut metadata = FileMetadata::default();
        if !file.category.policy().requires_gps {
            return metadata;
        }

        let fix = match ctx.reported_location {
            Some(fix) => fix,
            None => match self.environment.current_location().await {
                Ok(fix) => fix,
                Err(err) => {
                    warn!(file = %file.original_name, error = %err, "using fallback location");
                    self.settings.fallback_location
                }
            },
        };

        match self.environment.current_weather(&fix).await {
            Ok(weather) => metadata.weather = Some(weather),
            Err(err) => warn!(file = %file.original_name, error = %err, "weather omitted"),
        }
        metadata.gps = Some(fix);
        metadata
    }

    async fn mark_failed(&self, upload_id: Uuid, file_name: &str) -> UploadProgress {
        let now = self.clock.now();
        match self
            .progress
            .apply(upload_id, ProgressEvent::Fail(FAILURE_MESSAGE.into()), now)
            .await
        {
            Ok(progress) => progress,
            Err(err) => {
                warn!(%upload_id, error = %err, "could not record failure on progress board");
                let mut progress = self
                    .progress
                    .get(&upload_id)
                    .await
                    .unwrap_or_else(|| UploadProgress::new(upload_id, file_name, now));
                progress.status = UploadStatus::Error;
                progress.error = Some(FAILURE_MESSAGE.into());
                progress
            }
        }
    }
}

/// `{unix millis}_{name}` with anything outside `[A-Za-z0-9._-]` replaced
/// and runs of dots collapsed, so the result is safe as a blob key segment.
pub fn storage_safe_name(original: &str, at: DateTime<Utc>) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars().take(MAX_NAME_CHARS) {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            c
        } else {
            '_'
        };
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_matches('.');
    let cleaned = if cleaned.is_empty() { "file" } else { cleaned };

    format!("{}_{}", at.timestamp_millis(), cleaned)
}

fn key_segment(raw: &str) -> String {
    let segment: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') { c } else { '_' })
        .collect();
    if segment.is_empty() {
        "_".to_string()
    } else {
        segment
    }
}
