//! Automatic tags for uploads in tag-eligible categories.

use crate::models::{
    category::FileCategory, phase::ConstructionPhase, project_file::WeatherSnapshot,
};
use chrono::NaiveDate;

/// Above this many degrees Celsius a progress photo is tagged "hot weather".
pub const HOT_THRESHOLD_C: f64 = 25.0;

/// Below this many degrees Celsius a progress photo is tagged "cold weather".
pub const COLD_THRESHOLD_C: f64 = 5.0;

/// Build the tag list for an upload. Returns nothing for categories that are
/// not tag-eligible. The same inputs always give the same tags.
pub fn generate_tags(
    category: FileCategory,
    phase: ConstructionPhase,
    date: NaiveDate,
    weather: Option<&WeatherSnapshot>,
) -> Vec<String> {
    if !category.policy().auto_tag {
        return Vec::new();
    }

    let mut tags = vec![
        category.label().to_string(),
        phase.label().to_string(),
        date.format("%Y-%m-%d").to_string(),
    ];

    if category == FileCategory::ProgressPhotos {
        if let Some(weather) = weather {
            tags.push(weather.condition.to_lowercase());
            if weather.temperature > HOT_THRESHOLD_C {
                tags.push("hot weather".into());
            } else if weather.temperature < COLD_THRESHOLD_C {
                tags.push("cold weather".into());
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    tags.retain(|tag| !tag.is_empty() && seen.insert(tag.clone()));
    tags
}
