//! Static configuration exposed to clients: category policies and phases.

use crate::{
    handlers::envelope::Envelope,
    models::{
        category::{CategoryPolicy, FileCategory},
        phase::ConstructionPhase,
    },
};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntry {
    pub id: FileCategory,
    #[serde(flatten)]
    pub policy: CategoryPolicy,
    pub max_size_bytes: u64,
}

#[derive(Serialize)]
pub struct PhaseEntry {
    pub id: ConstructionPhase,
    pub label: &'static str,
}

/// `GET /api/categories`
pub async fn list_categories() -> Json<Envelope<Vec<CategoryEntry>>> {
    let entries: Vec<_> = FileCategory::ALL
        .into_iter()
        .map(|id| {
            let policy = id.policy();
            CategoryEntry {
                id,
                max_size_bytes: policy.max_size_bytes(),
                policy,
            }
        })
        .collect();
    let count = entries.len();
    Json(Envelope::new(entries).with_count(count))
}

/// `GET /api/phases`
pub async fn list_phases() -> Json<Envelope<Vec<PhaseEntry>>> {
    let entries: Vec<_> = ConstructionPhase::ALL
        .into_iter()
        .map(|id| PhaseEntry {
            id,
            label: id.label(),
        })
        .collect();
    let count = entries.len();
    Json(Envelope::new(entries).with_count(count))
}
