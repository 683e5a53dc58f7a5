//! File categories and the static upload policy attached to each of them.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const BYTES_PER_MB: u64 = 1024 * 1024;

const PDF: &str = "application/pdf";
const JPEG: &str = "image/jpeg";
const PNG: &str = "image/png";
const MSWORD: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Kind of project artifact an upload is filed under.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    ProgressPhotos,
    PlanningDocuments,
    BuildingControl,
    DesignDocuments,
    Certificates,
    InvoicesReceipts,
    Correspondence,
    HealthSafety,
    Specifications,
    Contracts,
    Other,
}

/// MIME types a category will take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptedTypes {
    All,
    Only(&'static [&'static str]),
}

impl AcceptedTypes {
    /// Case-insensitive match that ignores MIME parameters such as `charset`.
    pub fn accepts(&self, mime_type: &str) -> bool {
        match self {
            AcceptedTypes::All => true,
            AcceptedTypes::Only(types) => {
                let essence = mime_type.split(';').next().unwrap_or("").trim();
                types
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(essence))
            }
        }
    }
}

impl Serialize for AcceptedTypes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AcceptedTypes::All => serializer.serialize_str("*"),
            AcceptedTypes::Only(types) => types.serialize(serializer),
        }
    }
}

/// Upload rules for one category.
#[derive(Serialize, Clone, Copy, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPolicy {
    pub label: &'static str,
    pub icon: &'static str,
    pub accepted_types: AcceptedTypes,
    pub max_size_mb: u64,
    pub requires_gps: bool,
    pub auto_tag: bool,
}

impl CategoryPolicy {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * BYTES_PER_MB
    }
}

impl FileCategory {
    pub const ALL: [FileCategory; 11] = [
        FileCategory::ProgressPhotos,
        FileCategory::PlanningDocuments,
        FileCategory::BuildingControl,
        FileCategory::DesignDocuments,
        FileCategory::Certificates,
        FileCategory::InvoicesReceipts,
        FileCategory::Correspondence,
        FileCategory::HealthSafety,
        FileCategory::Specifications,
        FileCategory::Contracts,
        FileCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::ProgressPhotos => "progress_photos",
            FileCategory::PlanningDocuments => "planning_documents",
            FileCategory::BuildingControl => "building_control",
            FileCategory::DesignDocuments => "design_documents",
            FileCategory::Certificates => "certificates",
            FileCategory::InvoicesReceipts => "invoices_receipts",
            FileCategory::Correspondence => "correspondence",
            FileCategory::HealthSafety => "health_safety",
            FileCategory::Specifications => "specifications",
            FileCategory::Contracts => "contracts",
            FileCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        self.policy().label
    }

    /// Look up the static policy row for this category.
    pub fn policy(&self) -> CategoryPolicy {
        match self {
            FileCategory::ProgressPhotos => CategoryPolicy {
                label: "Progress Photos",
                icon: "camera",
                accepted_types: AcceptedTypes::Only(&[JPEG, PNG, "image/heic", "image/webp"]),
                max_size_mb: 50,
                requires_gps: true,
                auto_tag: true,
            },
            FileCategory::PlanningDocuments => CategoryPolicy {
                label: "Planning Documents",
                icon: "file-text",
                accepted_types: AcceptedTypes::Only(&[PDF, JPEG, PNG]),
                max_size_mb: 25,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::BuildingControl => CategoryPolicy {
                label: "Building Control",
                icon: "shield-check",
                accepted_types: AcceptedTypes::Only(&[PDF, JPEG, PNG]),
                max_size_mb: 25,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::DesignDocuments => CategoryPolicy {
                label: "Design Documents",
                icon: "ruler",
                accepted_types: AcceptedTypes::Only(&[
                    PDF,
                    "image/vnd.dwg",
                    "application/acad",
                    JPEG,
                    PNG,
                ]),
                max_size_mb: 100,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::Certificates => CategoryPolicy {
                label: "Certificates",
                icon: "award",
                accepted_types: AcceptedTypes::Only(&[PDF, JPEG, PNG]),
                max_size_mb: 10,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::InvoicesReceipts => CategoryPolicy {
                label: "Invoices & Receipts",
                icon: "receipt",
                accepted_types: AcceptedTypes::Only(&[PDF, JPEG, PNG]),
                max_size_mb: 10,
                requires_gps: false,
                auto_tag: false,
            },
            FileCategory::Correspondence => CategoryPolicy {
                label: "Correspondence",
                icon: "mail",
                accepted_types: AcceptedTypes::Only(&[
                    PDF,
                    MSWORD,
                    DOCX,
                    "text/plain",
                    "message/rfc822",
                ]),
                max_size_mb: 10,
                requires_gps: false,
                auto_tag: false,
            },
            FileCategory::HealthSafety => CategoryPolicy {
                label: "Health & Safety",
                icon: "hard-hat",
                accepted_types: AcceptedTypes::Only(&[PDF, JPEG, PNG]),
                max_size_mb: 25,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::Specifications => CategoryPolicy {
                label: "Specifications",
                icon: "clipboard-list",
                accepted_types: AcceptedTypes::Only(&[PDF, MSWORD, DOCX, XLSX]),
                max_size_mb: 25,
                requires_gps: false,
                auto_tag: true,
            },
            FileCategory::Contracts => CategoryPolicy {
                label: "Contracts",
                icon: "file-signature",
                accepted_types: AcceptedTypes::Only(&[PDF, MSWORD, DOCX]),
                max_size_mb: 25,
                requires_gps: false,
                auto_tag: false,
            },
            FileCategory::Other => CategoryPolicy {
                label: "Other",
                icon: "folder",
                accepted_types: AcceptedTypes::All,
                max_size_mb: 100,
                requires_gps: false,
                auto_tag: false,
            },
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown file category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for FileCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_other_accepts_everything() {
        for category in FileCategory::ALL {
            let all = category.policy().accepted_types == AcceptedTypes::All;
            assert_eq!(all, category == FileCategory::Other, "{category}");
        }
    }

    #[test]
    fn only_progress_photos_require_gps() {
        let gps: Vec<_> = FileCategory::ALL
            .into_iter()
            .filter(|c| c.policy().requires_gps)
            .collect();
        assert_eq!(gps, vec![FileCategory::ProgressPhotos]);
    }

    #[test]
    fn accepts_ignores_case_and_parameters() {
        let policy = FileCategory::Correspondence.policy();
        assert!(policy.accepted_types.accepts("TEXT/PLAIN; charset=utf-8"));
        assert!(!policy.accepted_types.accepts("image/jpeg"));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!(
            "health_safety".parse::<FileCategory>().unwrap(),
            FileCategory::HealthSafety
        );
        assert!("blueprints".parse::<FileCategory>().is_err());
    }

    #[test]
    fn serde_name_matches_as_str() {
        for category in FileCategory::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, serde_json::json!(category.as_str()));
        }
    }

    #[test]
    fn progress_photo_ceiling_is_fifty_megabytes() {
        assert_eq!(
            FileCategory::ProgressPhotos.policy().max_size_bytes(),
            50 * 1024 * 1024
        );
    }
}
