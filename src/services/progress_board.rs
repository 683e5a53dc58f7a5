//! Shared view of uploads that are in flight or recently finished.
//!
//! Finished entries stay on display for `retention` and are dropped the next
//! time the board is touched after that, whether or not anyone reads it.

use crate::models::progress::{ProgressError, ProgressEvent, UploadProgress};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// How long a finished upload stays visible when nothing else is configured.
pub const DEFAULT_RETENTION_SECS: i64 = 2;

#[derive(Clone, Debug)]
pub struct ProgressBoard {
    entries: Arc<Mutex<HashMap<Uuid, UploadProgress>>>,
    retention: Duration,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_RETENTION_SECS))
    }
}

impl ProgressBoard {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::default(),
            retention,
        }
    }

    pub async fn start(&self, file_id: Uuid, file_name: &str, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        drop_expired(&mut entries, now, self.retention);
        entries.insert(file_id, UploadProgress::new(file_id, file_name, now));
    }

    /// Step one entry and return its new state.
    pub async fn apply(
        &self,
        file_id: Uuid,
        event: ProgressEvent,
        now: DateTime<Utc>,
    ) -> Result<UploadProgress, ProgressError> {
        let mut entries = self.entries.lock().await;
        drop_expired(&mut entries, now, self.retention);
        match entries.get_mut(&file_id) {
            Some(entry) => {
                entry.apply(event, now)?;
                Ok(entry.clone())
            }
            None => Err(ProgressError::UnknownUpload(file_id)),
        }
    }

    pub async fn get(&self, file_id: &Uuid) -> Option<UploadProgress> {
        self.entries.lock().await.get(file_id).cloned()
    }

    /// Every entry, oldest update first.
    pub async fn snapshot(&self) -> Vec<UploadProgress> {
        let mut items: Vec<_> = self.entries.lock().await.values().cloned().collect();
        items.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        items
    }

    /// Forget terminal entries older than the retention. Returns how many
    /// were dropped.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        drop_expired(&mut *self.entries.lock().await, now, self.retention)
    }
}

fn drop_expired(
    entries: &mut HashMap<Uuid, UploadProgress>,
    now: DateTime<Utc>,
    retention: Duration,
) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !(entry.is_terminal() && now - entry.updated_at >= retention));
    before - entries.len()
}
