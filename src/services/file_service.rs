//! FileService: the shared state handed to every handler.
//!
//! Wires intake, the upload pipeline, the registry and the blob store
//! together, and implements the bulk actions over a selection.

use crate::{
    models::{
        browser::{BulkAction, FileQuery, Selection},
        category::FileCategory,
        phase::ConstructionPhase,
        progress::UploadProgress,
        project_file::{GpsFix, ProjectFile},
    },
    services::{
        blob_store::{BlobError, BlobReader, BlobStore},
        clock::Clock,
        environment::EnvironmentProvider,
        intake::{Candidate, RejectedFile, StagingArea},
        pipeline::{BatchContext, BatchReport, PipelineSettings, UploadPipeline},
        progress_board::ProgressBoard,
        registry::FileRegistry,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub max_files: usize,
    pub progress_retention: chrono::Duration,
    pub pipeline: PipelineSettings,
}

/// Outcome of one upload request.
#[derive(Serialize, Debug)]
pub struct UploadSummary {
    pub uploaded: Vec<ProjectFile>,
    pub rejected: Vec<RejectedFile>,
    pub failed: Vec<UploadProgress>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub id: Uuid,
    pub original_name: String,
    pub url: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct BulkFailure {
    pub id: Uuid,
    pub message: String,
}

#[derive(Serialize, Debug)]
pub struct BulkOutcome {
    pub action: BulkAction,
    /// Ids the action was applied to.
    pub processed: Vec<Uuid>,
    /// Ids that are not in this project's registry.
    pub missing: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
    /// Filled for `download` only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<DownloadLink>,
}

#[derive(Clone)]
pub struct FileService {
    registry: Arc<RwLock<FileRegistry>>,
    blobs: Arc<dyn BlobStore>,
    progress: ProgressBoard,
    pipeline: UploadPipeline,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl FileService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        environment: Arc<dyn EnvironmentProvider>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        let registry = Arc::new(RwLock::new(FileRegistry::new()));
        let progress = ProgressBoard::new(settings.progress_retention);
        let pipeline = UploadPipeline::new(
            blobs.clone(),
            environment,
            clock.clone(),
            registry.clone(),
            progress.clone(),
            settings.pipeline.clone(),
        );
        Self {
            registry,
            blobs,
            progress,
            pipeline,
            clock,
            settings,
        }
    }

    /// Validate, stage and upload one batch of candidates.
    pub async fn upload(
        &self,
        project_id: &str,
        category: FileCategory,
        phase: ConstructionPhase,
        reported_location: Option<GpsFix>,
        candidates: Vec<Candidate>,
    ) -> UploadSummary {
        let mut staging = StagingArea::new(self.settings.max_files);
        let intake = staging.stage(candidates, category, phase);
        info!(
            project_id,
            %category,
            %phase,
            staged = intake.staged.len(),
            rejected = intake.rejected.len(),
            "upload batch received"
        );

        let ctx = BatchContext {
            project_id: project_id.to_string(),
            reported_location,
        };
        let BatchReport { uploaded, failed } =
            self.pipeline.run_batch(&ctx, staging.drain()).await;

        UploadSummary {
            uploaded,
            rejected: intake.rejected,
            failed,
        }
    }

    /// Filtered, sorted files of one project.
    pub async fn browse(&self, project_id: &str, mut query: FileQuery) -> Vec<ProjectFile> {
        query.project_id = Some(project_id.to_string());
        self.registry.read().await.query(&query)
    }

    pub async fn get(&self, id: &Uuid) -> Option<ProjectFile> {
        self.registry.read().await.get(id).cloned()
    }

    /// Open the payload stored under `key` together with its record.
    pub async fn open_blob(&self, key: &str) -> Result<(ProjectFile, BlobReader), BlobError> {
        let record = self
            .registry
            .read()
            .await
            .find_by_storage_key(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))?;
        let reader = self.blobs.open(key).await?;
        Ok((record, reader))
    }

    /// Progress board after dropping entries that finished long enough ago.
    pub async fn progress(&self) -> Vec<UploadProgress> {
        let dropped = self
            .progress
            .prune(self.clock.now())
            .await;
        if dropped > 0 {
            tracing::debug!(dropped, "pruned finished progress entries");
        }
        self.progress.snapshot().await
    }

    /// Apply a bulk action to the selected files of one project.
    ///
    /// Delete removes the payload first and drops the record only once the
    /// store confirms; a failed store delete leaves the record in place.
    pub async fn bulk(
        &self,
        project_id: &str,
        action: BulkAction,
        selection: &Selection,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome {
            action,
            processed: Vec::new(),
            missing: Vec::new(),
            failed: Vec::new(),
            downloads: Vec::new(),
        };

        for id in selection.iter() {
            let record = self
                .registry
                .read()
                .await
                .get(id)
                .filter(|f| f.project_id == project_id)
                .cloned();
            let Some(record) = record else {
                outcome.missing.push(*id);
                continue;
            };

            match action {
                BulkAction::Download => {
                    outcome.downloads.push(DownloadLink {
                        id: record.id,
                        original_name: record.original_name.clone(),
                        url: record.url.clone(),
                    });
                    outcome.processed.push(record.id);
                }
                BulkAction::Archive => {
                    let now = self.clock.now();
                    self.registry.write().await.archive(id, now);
                    outcome.processed.push(record.id);
                }
                BulkAction::Delete => match self.blobs.delete(&record.storage_key).await {
                    Ok(()) => {
                        self.registry.write().await.remove(id);
                        outcome.processed.push(record.id);
                    }
                    Err(err) => {
                        warn!(id = %record.id, error = %err, "payload delete failed, record kept");
                        outcome.failed.push(BulkFailure {
                            id: record.id,
                            message: err.to_string(),
                        });
                    }
                },
            }
        }

        info!(
            project_id,
            ?action,
            selected = selection.len(),
            processed = outcome.processed.len(),
            missing = outcome.missing.len(),
            failed = outcome.failed.len(),
            "bulk action applied"
        );
        outcome
    }

    /// Readiness: the blob store accepts a scratch write.
    pub async fn probe_storage(&self) -> Result<(), BlobError> {
        self.blobs.probe().await
    }
}
