//! Represents a file that finished the upload pipeline.

use super::{category::FileCategory, phase::ConstructionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed upload attached to a project.
///
/// The record carries metadata only. Payload bytes live in the blob store and
/// are addressed through `storage_key`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Generated when the pipeline completes.
    pub id: Uuid,

    /// Owning project, opaque to this service.
    pub project_id: String,

    /// Name as selected by the user.
    pub original_name: String,

    /// Storage-safe variant of the name (timestamp prefix, sanitized).
    pub file_name: String,

    /// Size in bytes.
    pub file_size: u64,

    pub mime_type: String,

    pub category: FileCategory,

    pub phase: ConstructionPhase,

    /// Ordered, without duplicates.
    pub tags: Vec<String>,

    pub metadata: FileMetadata,

    pub url: String,

    /// Set for `image/*` uploads only.
    pub thumbnail_url: Option<String>,

    /// Key of the payload inside the blob store.
    #[serde(skip_serializing, default)]
    pub storage_key: String,

    /// MD5 of the payload as reported by the blob store.
    pub checksum: String,

    /// Progress photos are public by default, everything else private.
    pub is_public: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set by the bulk archive action.
    pub archived_at: Option<DateTime<Utc>>,
}

impl ProjectFile {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub gps: Option<GpsFix>,
    pub weather: Option<WeatherSnapshot>,
    pub version: u32,
    pub is_latest_version: bool,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            gps: None,
            weather: None,
            version: 1,
            is_latest_version: true,
        }
    }
}

/// A device position. `accuracy` is in metres.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

/// Conditions on site at upload time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub condition: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Wind speed, mph.
    pub wind_speed: f64,
}
