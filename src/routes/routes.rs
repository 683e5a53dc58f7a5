//! Defines routes for the project file service.
//!
//! ## Structure
//! - **Catalog**
//!   - `GET  /api/categories`: category policies
//!   - `GET  /api/phases`: construction phases
//!
//! - **Project files**
//!   - `POST /api/projects/{project_id}/files`: multipart upload
//!   - `GET  /api/projects/{project_id}/files`: filter, sort, grid or list view
//!   - `POST /api/projects/{project_id}/files/bulk`: download, archive or delete
//!   - `GET  /api/files/{id}`: one record
//!   - `GET  /api/uploads`: progress board
//!
//! - **Payloads**
//!   - `GET  /blobs/{*key}`: stream a stored file
//!
//! The wildcard `*key` allows nested keys like `p1/<id>/1717409700000_slab.jpg`.

use crate::{
    handlers::{
        catalog_handlers::{list_categories, list_phases},
        file_handlers::{bulk_action, get_blob, get_file, list_files, list_progress, upload_files},
        health_handlers::{healthz, readyz},
    },
    services::file_service::FileService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Request bodies above `max_body_bytes` are refused
/// before any handler runs.
pub fn routes(max_body_bytes: usize) -> Router<FileService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/categories", get(list_categories))
        .route("/api/phases", get(list_phases))
        .route(
            "/api/projects/{project_id}/files",
            post(upload_files).get(list_files),
        )
        .route("/api/projects/{project_id}/files/bulk", post(bulk_action))
        .route("/api/files/{id}", get(get_file))
        .route("/api/uploads", get(list_progress))
        .route("/blobs/{*key}", get(get_blob))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        blob_store::MemoryBlobStore,
        clock::SystemClock,
        environment::{DEFAULT_LOCATION, StaticEnvironment},
        file_service::ServiceSettings,
        pipeline::PipelineSettings,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    const BOUNDARY: &str = "----site-diary-boundary";

    fn app() -> Router {
        let service = FileService::new(
            Arc::new(MemoryBlobStore::new("memory")),
            Arc::new(StaticEnvironment::default()),
            Arc::new(SystemClock),
            ServiceSettings {
                max_files: 5,
                progress_retention: chrono::Duration::seconds(2),
                pipeline: PipelineSettings {
                    tick_interval: Duration::ZERO,
                    fallback_location: DEFAULT_LOCATION,
                },
            },
        );
        routes(1024 * 1024).with_state(service)
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(file_name, content_type, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(project: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/projects/{project}/files"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = app().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_probes_the_memory_store() {
        let response = app().oneshot(get("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["storage"]["ok"], true);
    }

    #[tokio::test]
    async fn catalog_lists_every_category_and_phase() {
        let categories = json_body(app().oneshot(get("/api/categories")).await.unwrap()).await;
        assert_eq!(categories["success"], true);
        assert_eq!(categories["metadata"]["count"], 11);
        assert_eq!(categories["data"][0]["id"], "progress_photos");
        assert_eq!(categories["data"][0]["requiresGps"], true);

        let phases = json_body(app().oneshot(get("/api/phases")).await.unwrap()).await;
        assert_eq!(phases["metadata"]["count"], 15);
    }

    #[tokio::test]
    async fn upload_then_browse_and_download() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload_request(
                "p1",
                &[
                    Part::Text("category", "progress_photos"),
                    Part::Text("phase", "foundations"),
                    Part::File("slab pour.jpg", "image/jpeg", b"\xff\xd8fake-jpeg"),
                    Part::File("setup.exe", "application/x-msdownload", b"MZ"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["metadata"]["uploaded"], 1);
        assert_eq!(body["data"]["rejected"][0]["code"], "UNSUPPORTED_TYPE");

        let uploaded = &body["data"]["uploaded"][0];
        assert_eq!(uploaded["originalName"], "slab pour.jpg");
        assert_eq!(uploaded["metadata"]["gps"]["latitude"], DEFAULT_LOCATION.latitude);
        assert!(uploaded.get("storageKey").is_none());
        let url = uploaded["url"].as_str().unwrap().to_string();
        let id = uploaded["id"].as_str().unwrap().to_string();

        let listing = json_body(
            app.clone()
                .oneshot(get("/api/projects/p1/files?view=list&sort=name&order=asc"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(listing["data"]["view"], "list");
        assert_eq!(listing["data"]["items"][0]["id"], id.as_str());
        assert_eq!(listing["metadata"]["count"], 1);

        let key = url.trim_start_matches("blob:memory/");
        let response = app
            .clone()
            .oneshot(get(&format!("/blobs/{key}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\xff\xd8fake-jpeg");

        let record = json_body(
            app.oneshot(get(&format!("/api/files/{id}")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(record["data"]["phase"], "foundations");
    }

    #[tokio::test]
    async fn upload_without_category_is_missing_fields() {
        let response = app()
            .oneshot(upload_request(
                "p1",
                &[
                    Part::Text("phase", "design"),
                    Part::File("plan.pdf", "application/pdf", b"%PDF"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELDS");
    }

    #[tokio::test]
    async fn upload_with_unknown_phase_is_invalid() {
        let response = app()
            .oneshot(upload_request(
                "p1",
                &[
                    Part::Text("category", "contracts"),
                    Part::Text("phase", "topping_out"),
                    Part::File("jct.pdf", "application/pdf", b"%PDF"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_FIELD");
    }

    #[tokio::test]
    async fn all_rejected_batch_answers_ok() {
        let response = app()
            .oneshot(upload_request(
                "p1",
                &[
                    Part::Text("category", "contracts"),
                    Part::Text("phase", "design"),
                    Part::File("photo.png", "image/png", b"png"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metadata"]["uploaded"], 0);
        assert_eq!(body["metadata"]["rejected"], 1);
    }

    #[tokio::test]
    async fn bulk_needs_a_selection() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/projects/p1/files/bulk")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"action":"delete","ids":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "MISSING_REQUIRED_FIELDS"
        );
    }

    #[tokio::test]
    async fn file_lookup_errors() {
        let bad_id = app().oneshot(get("/api/files/not-a-uuid")).await.unwrap();
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

        let unknown = app()
            .oneshot(get(&format!("/api/files/{}", uuid::Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(unknown).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn bad_sort_key_is_invalid_field() {
        let response = app()
            .oneshot(get("/api/projects/p1/files?sort=colour"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_FIELD");
    }
}
