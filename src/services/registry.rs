//! In-process list of completed uploads.
//!
//! Records are kept in completion order; callers that need a stable order
//! go through [`FileRegistry::query`] with an explicit sort key.

use crate::models::{
    browser::{FileQuery, SortDirection, SortKey},
    project_file::ProjectFile,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct FileRegistry {
    files: Vec<ProjectFile>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, file: ProjectFile) {
        self.files.push(file);
    }

    pub fn get(&self, id: &Uuid) -> Option<&ProjectFile> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn find_by_storage_key(&self, key: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.storage_key == key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Files matching every constraint of `query`, sorted by its key.
    pub fn query(&self, query: &FileQuery) -> Vec<ProjectFile> {
        let mut hits: Vec<ProjectFile> = self
            .files
            .iter()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        sort_files(&mut hits, query.sort, query.order);
        hits
    }

    /// Drop a record. Returns it if it was present.
    pub fn remove(&mut self, id: &Uuid) -> Option<ProjectFile> {
        let index = self.files.iter().position(|f| &f.id == id)?;
        Some(self.files.remove(index))
    }

    /// Mark a record archived. Archiving twice keeps the first timestamp.
    pub fn archive(&mut self, id: &Uuid, at: DateTime<Utc>) -> Option<&ProjectFile> {
        let file = self.files.iter_mut().find(|f| &f.id == id)?;
        if file.archived_at.is_none() {
            file.archived_at = Some(at);
            file.updated_at = at;
        }
        Some(file)
    }
}

fn compare(a: &ProjectFile, b: &ProjectFile, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.created_at.cmp(&b.created_at),
        SortKey::Name => a.original_name.cmp(&b.original_name),
        SortKey::Size => a.file_size.cmp(&b.file_size),
    }
}

/// Stable ascending sort; descending is its exact reverse.
pub fn sort_files(files: &mut [ProjectFile], key: SortKey, direction: SortDirection) {
    files.sort_by(|a, b| compare(a, b, key));
    if direction == SortDirection::Desc {
        files.reverse();
    }
}
