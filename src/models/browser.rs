//! Query, view and selection types for browsing the file registry.

use super::{
    category::FileCategory, phase::ConstructionPhase, project_file::ProjectFile,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Name,
    Size,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Filter and sort options. Every `None` constraint matches all files.
#[derive(Clone, Debug, Default)]
pub struct FileQuery {
    pub project_id: Option<String>,
    pub category: Option<FileCategory>,
    pub phase: Option<ConstructionPhase>,
    pub search: Option<String>,
    /// Inclusive lower bound on the creation date (UTC).
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date (UTC).
    pub to: Option<NaiveDate>,
    pub sort: SortKey,
    pub order: SortDirection,
    pub include_archived: bool,
}

impl FileQuery {
    /// True when `file` satisfies every constraint that is set.
    pub fn matches(&self, file: &ProjectFile) -> bool {
        if !self.include_archived && file.is_archived() {
            return false;
        }
        if let Some(project_id) = &self.project_id {
            if &file.project_id != project_id {
                return false;
            }
        }
        if let Some(category) = self.category {
            if file.category != category {
                return false;
            }
        }
        if let Some(phase) = self.phase {
            if file.phase != phase {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty()
                && !file
                    .original_name
                    .to_lowercase()
                    .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        let created = file.created_at.date_naive();
        if self.from.is_some_and(|from| created < from) {
            return false;
        }
        if self.to.is_some_and(|to| created > to) {
            return false;
        }
        true
    }
}

/// Files picked for a bulk action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<Uuid>,
}

impl Selection {
    pub fn toggle(&mut self, id: Uuid) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn is_selected(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// The bulk-action bar is offered as soon as one file is selected.
    pub fn shows_bulk_actions(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.ids.iter()
    }
}

impl FromIterator<Uuid> for Selection {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        let mut selection = Selection::default();
        for id in iter {
            if !selection.is_selected(&id) {
                selection.toggle(id);
            }
        }
        selection
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Download,
    Archive,
    Delete,
}

/// Grid presentation of a file.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileCard {
    pub id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub url: String,
    pub category: FileCategory,
    pub category_label: &'static str,
    pub category_icon: &'static str,
    pub phase_label: &'static str,
    pub tags: Vec<String>,
    pub has_gps: bool,
    pub has_weather: bool,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&ProjectFile> for FileCard {
    fn from(file: &ProjectFile) -> Self {
        let policy = file.category.policy();
        Self {
            id: file.id,
            title: file.original_name.clone(),
            thumbnail_url: file.thumbnail_url.clone(),
            url: file.url.clone(),
            category: file.category,
            category_label: policy.label,
            category_icon: policy.icon,
            phase_label: file.phase.label(),
            tags: file.tags.clone(),
            has_gps: file.metadata.gps.is_some(),
            has_weather: file.metadata.weather.is_some(),
            file_size: file.file_size,
            created_at: file.created_at,
        }
    }
}

/// Compact list presentation of a file.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileRow {
    pub id: Uuid,
    pub name: String,
    pub category: FileCategory,
    pub phase: ConstructionPhase,
    pub tags: Vec<String>,
    pub has_gps: bool,
    pub has_weather: bool,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&ProjectFile> for FileRow {
    fn from(file: &ProjectFile) -> Self {
        Self {
            id: file.id,
            name: file.original_name.clone(),
            category: file.category,
            phase: file.phase,
            tags: file.tags.clone(),
            has_gps: file.metadata.gps.is_some(),
            has_weather: file.metadata.weather.is_some(),
            file_size: file.file_size,
            created_at: file.created_at,
        }
    }
}

/// A registry view rendered for one mode. The mode never changes which files
/// appear or their order.
#[derive(Serialize, Debug)]
#[serde(tag = "view", content = "items", rename_all = "snake_case")]
pub enum FileView {
    Grid(Vec<FileCard>),
    List(Vec<FileRow>),
}

impl FileView {
    pub fn render(mode: ViewMode, files: &[ProjectFile]) -> Self {
        match mode {
            ViewMode::Grid => FileView::Grid(files.iter().map(FileCard::from).collect()),
            ViewMode::List => FileView::List(files.iter().map(FileRow::from).collect()),
        }
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            FileView::Grid(cards) => cards.iter().map(|c| c.id).collect(),
            FileView::List(rows) => rows.iter().map(|r| r.id).collect(),
        }
    }
}
