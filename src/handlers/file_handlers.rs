//! HTTP handlers for uploading, browsing and acting on project files.
//! Payload downloads stream straight from the blob store.

use crate::{
    errors::AppError,
    handlers::envelope::Envelope,
    models::{
        browser::{BulkAction, FileQuery, FileView, Selection, SortDirection, SortKey, ViewMode},
        category::FileCategory,
        phase::ConstructionPhase,
        progress::UploadProgress,
        project_file::{GpsFix, ProjectFile},
    },
    services::{
        file_service::{BulkOutcome, FileService, UploadSummary},
        intake::Candidate,
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Query params accepted by the file browser.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseParams {
    pub category: Option<FileCategory>,
    pub phase: Option<ConstructionPhase>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub sort: Option<SortKey>,
    pub order: Option<SortDirection>,
    pub view: Option<ViewMode>,
    pub include_archived: Option<bool>,
}

impl From<&BrowseParams> for FileQuery {
    fn from(params: &BrowseParams) -> Self {
        FileQuery {
            project_id: None,
            category: params.category,
            phase: params.phase,
            search: params.search.clone(),
            from: params.from,
            to: params.to,
            sort: params.sort.unwrap_or_default(),
            order: params.order.unwrap_or_default(),
            include_archived: params.include_archived.unwrap_or(false),
        }
    }
}

/// Body for `POST /api/projects/{project_id}/files/bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: Option<BulkAction>,
    pub ids: Option<Vec<Uuid>>,
}

/// Form fields of an upload request, files excluded.
#[derive(Debug, Default)]
struct UploadForm {
    category: Option<String>,
    phase: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    accuracy: Option<String>,
    candidates: Vec<Candidate>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                form.candidates
                    .push(Candidate::new(file_name, mime_type, bytes));
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "category" => form.category = Some(value),
                "phase" => form.phase = Some(value),
                "latitude" => form.latitude = Some(value),
                "longitude" => form.longitude = Some(value),
                "accuracy" => form.accuracy = Some(value),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    /// Both coordinates or neither; accuracy is optional on top.
    fn location(&self) -> Result<Option<GpsFix>, AppError> {
        let parse = |label: &str, raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::invalid_field(format!("{label} `{raw}` is not a number")))
        };

        match (self.latitude.as_deref(), self.longitude.as_deref()) {
            (None, None) => Ok(None),
            (Some(lat), Some(lon)) => {
                let latitude = parse("latitude", lat)?;
                let longitude = parse("longitude", lon)?;
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(AppError::invalid_field("coordinates out of range"));
                }
                let accuracy = self
                    .accuracy
                    .as_deref()
                    .map(|raw| parse("accuracy", raw))
                    .transpose()?;
                Ok(Some(GpsFix {
                    latitude,
                    longitude,
                    accuracy,
                }))
            }
            _ => Err(AppError::missing_fields(
                "latitude and longitude must be sent together",
            )),
        }
    }
}

/// Upload one or more files to `/api/projects/{project_id}/files`.
///
/// Multipart fields: `category`, `phase`, optional `latitude`/`longitude`/
/// `accuracy`, and any number of file parts.
pub async fn upload_files(
    State(service): State<FileService>,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart).await?;

    let mut missing = Vec::new();
    if form.category.is_none() {
        missing.push("category");
    }
    if form.phase.is_none() {
        missing.push("phase");
    }
    if form.candidates.is_empty() {
        missing.push("file");
    }
    if !missing.is_empty() {
        return Err(AppError::missing_fields(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let category = form
        .category
        .as_deref()
        .unwrap_or_default()
        .parse::<FileCategory>()
        .map_err(|e| AppError::invalid_field(e.to_string()))?;
    let phase = form
        .phase
        .as_deref()
        .unwrap_or_default()
        .parse::<ConstructionPhase>()
        .map_err(|e| AppError::invalid_field(e.to_string()))?;
    let location = form.location()?;

    let summary: UploadSummary = service
        .upload(&project_id, category, phase, location, form.candidates)
        .await;

    let status = if summary.uploaded.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let (uploaded, rejected, failed) = (
        summary.uploaded.len(),
        summary.rejected.len(),
        summary.failed.len(),
    );
    let body = Envelope::new(summary)
        .with("uploaded", uploaded)
        .with("rejected", rejected)
        .with("failed", failed);
    Ok((status, Json(body)).into_response())
}

/// GET `/api/projects/{project_id}/files`: filtered, sorted, rendered view.
pub async fn list_files(
    State(service): State<FileService>,
    Path(project_id): Path<String>,
    params: Result<Query<BrowseParams>, QueryRejection>,
) -> Result<Json<Envelope<FileView>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::invalid_field(e.body_text()))?;
    let query = FileQuery::from(&params);
    let view_mode = params.view.unwrap_or_default();

    let files = service.browse(&project_id, query).await;
    let count = files.len();
    Ok(Json(
        Envelope::new(FileView::render(view_mode, &files)).with_count(count),
    ))
}

/// GET `/api/files/{id}`: one record.
pub async fn get_file(
    State(service): State<FileService>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ProjectFile>>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::invalid_field(format!("`{}` is not a file id", id)))?;
    let file = service
        .get(&id)
        .await
        .ok_or_else(|| AppError::not_found(format!("file {} not found", id)))?;
    Ok(Json(Envelope::new(file)))
}

/// POST `/api/projects/{project_id}/files/bulk`: download, archive or delete a selection.
pub async fn bulk_action(
    State(service): State<FileService>,
    Path(project_id): Path<String>,
    payload: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<Envelope<BulkOutcome>>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::invalid_field(e.body_text()))?;

    let (Some(action), Some(ids)) = (request.action, request.ids) else {
        return Err(AppError::missing_fields("`action` and `ids` are required"));
    };
    let selection: Selection = ids.into_iter().collect();
    if !selection.shows_bulk_actions() {
        return Err(AppError::missing_fields("select at least one file"));
    }

    let outcome = service.bulk(&project_id, action, &selection).await;
    let count = outcome.processed.len();
    Ok(Json(Envelope::new(outcome).with_count(count)))
}

/// GET `/api/uploads`: uploads in flight or recently finished.
pub async fn list_progress(
    State(service): State<FileService>,
) -> Json<Envelope<Vec<UploadProgress>>> {
    let items = service.progress().await;
    let count = items.len();
    Json(Envelope::new(items).with_count(count))
}

/// GET `/blobs/{*key}`: stream a stored payload.
pub async fn get_blob(
    State(service): State<FileService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (meta, reader) = service.open_blob(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, meta: &ProjectFile) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.file_size));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.checksum)) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.updated_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if let Ok(value) =
        HeaderValue::from_str(&format!("inline; filename=\"{}\"", meta.file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
