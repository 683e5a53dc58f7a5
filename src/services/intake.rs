//! Upload intake: per-category validation and the staging list.
//!
//! Nothing here performs I/O. Accepted files are only staged; the pipeline
//! turns them into registry records.

use crate::models::{category::FileCategory, phase::ConstructionPhase};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// A file offered by the client, not yet validated.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Candidate {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let original_name = original_name.into();
        Self {
            original_name: if original_name.trim().is_empty() {
                "upload".to_string()
            } else {
                original_name
            },
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A validated file waiting for the pipeline.
#[derive(Clone, Debug)]
pub struct StagedFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub category: FileCategory,
    pub phase: ConstructionPhase,
}

impl StagedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("type `{mime_type}` is not accepted for {category}")]
    UnsupportedType {
        mime_type: String,
        category: FileCategory,
    },
    #[error("{size} bytes exceeds the {max} byte limit for {category}")]
    TooLarge {
        size: u64,
        max: u64,
        category: FileCategory,
    },
    #[error("no more than {max} files can be staged at once")]
    BatchLimit { max: usize },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Rejection::TooLarge { .. } => "FILE_TOO_LARGE",
            Rejection::BatchLimit { .. } => "TOO_MANY_FILES",
        }
    }
}

/// A candidate that intake turned away, as reported to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub file_name: String,
    pub code: &'static str,
    pub message: String,
}

impl RejectedFile {
    fn new(file_name: &str, rejection: &Rejection) -> Self {
        Self {
            file_name: file_name.to_string(),
            code: rejection.code(),
            message: rejection.to_string(),
        }
    }
}

/// Check one candidate against the category policy.
pub fn validate_candidate(category: FileCategory, candidate: &Candidate) -> Result<(), Rejection> {
    let policy = category.policy();

    if !policy.accepted_types.accepts(&candidate.mime_type) {
        return Err(Rejection::UnsupportedType {
            mime_type: candidate.mime_type.clone(),
            category,
        });
    }

    let size = candidate.size();
    if size > policy.max_size_bytes() {
        return Err(Rejection::TooLarge {
            size,
            max: policy.max_size_bytes(),
            category,
        });
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct IntakeOutcome {
    /// Files accepted by this call, in selection order.
    pub staged: Vec<StagedFile>,
    pub rejected: Vec<RejectedFile>,
}

/// Files selected but not yet uploaded, capped at `max_files`.
#[derive(Debug)]
pub struct StagingArea {
    max_files: usize,
    staged: Vec<StagedFile>,
}

impl StagingArea {
    pub fn new(max_files: usize) -> Self {
        Self {
            max_files,
            staged: Vec::new(),
        }
    }

    /// Validate `candidates` in order and stage the ones that pass while room
    /// remains. Rejections are logged and returned.
    pub fn stage(
        &mut self,
        candidates: impl IntoIterator<Item = Candidate>,
        category: FileCategory,
        phase: ConstructionPhase,
    ) -> IntakeOutcome {
        let mut outcome = IntakeOutcome::default();

        for candidate in candidates {
            let verdict = validate_candidate(category, &candidate).and_then(|()| {
                if self.staged.len() >= self.max_files {
                    Err(Rejection::BatchLimit {
                        max: self.max_files,
                    })
                } else {
                    Ok(())
                }
            });

            match verdict {
                Ok(()) => {
                    if candidate.bytes.is_empty() {
                        warn!(file = %candidate.original_name, %category, "staging an empty file");
                    }
                    let file = StagedFile {
                        original_name: candidate.original_name,
                        mime_type: candidate.mime_type,
                        bytes: candidate.bytes,
                        category,
                        phase,
                    };
                    self.staged.push(file.clone());
                    outcome.staged.push(file);
                }
                Err(rejection) => {
                    warn!(
                        file = %candidate.original_name,
                        %category,
                        reason = %rejection,
                        "rejected upload candidate"
                    );
                    outcome
                        .rejected
                        .push(RejectedFile::new(&candidate.original_name, &rejection));
                }
            }
        }

        outcome
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Hand every staged file to the caller and clear the list.
    pub fn drain(&mut self) -> Vec<StagedFile> {
        std::mem::take(&mut self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    fn jpeg(name: &str, size: usize) -> Candidate {
        Candidate::new(name, "image/jpeg", vec![0u8; size])
    }

    #[test]
    fn ten_megabyte_jpeg_is_staged_as_progress_photo() {
        let mut staging = StagingArea::new(10);
        let outcome = staging.stage(
            [jpeg("slab.jpg", 10 * MB)],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Foundations,
        );
        assert_eq!(outcome.staged.len(), 1);
        assert!(outcome.rejected.is_empty());
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn sixty_megabyte_jpeg_is_rejected() {
        let mut staging = StagingArea::new(10);
        let outcome = staging.stage(
            [jpeg("drone.jpg", 60 * MB)],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Foundations,
        );
        assert!(outcome.staged.is_empty());
        assert_eq!(outcome.rejected[0].code, "FILE_TOO_LARGE");
        assert_eq!(staging.len(), 0);
    }

    #[test]
    fn exactly_at_the_ceiling_is_accepted() {
        let candidate = jpeg("edge.jpg", 10 * MB);
        assert!(validate_candidate(FileCategory::Certificates, &candidate).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected_unless_category_accepts_all() {
        let zip = Candidate::new("bundle.zip", "application/zip", vec![1u8; 64]);
        assert!(matches!(
            validate_candidate(FileCategory::Contracts, &zip),
            Err(Rejection::UnsupportedType { .. })
        ));
        assert!(validate_candidate(FileCategory::Other, &zip).is_ok());
    }

    #[test]
    fn empty_files_of_an_accepted_type_are_staged() {
        let empty = Candidate::new("blank.pdf", "application/pdf", Vec::<u8>::new());
        assert_eq!(validate_candidate(FileCategory::Contracts, &empty), Ok(()));

        let mut staging = StagingArea::new(5);
        let outcome = staging.stage(
            [Candidate::new("x.jpg", "image/jpeg", Vec::<u8>::new())],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Design,
        );
        assert_eq!(outcome.staged.len(), 1);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn batch_limit_counts_already_staged_files() {
        let mut staging = StagingArea::new(3);
        staging.stage(
            [jpeg("a.jpg", 10), jpeg("b.jpg", 10)],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Design,
        );
        let outcome = staging.stage(
            [jpeg("c.jpg", 10), jpeg("d.jpg", 10)],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Design,
        );
        assert_eq!(outcome.staged.len(), 1);
        assert_eq!(outcome.staged[0].original_name, "c.jpg");
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].code, "TOO_MANY_FILES");
        assert_eq!(staging.len(), 3);
    }

    #[test]
    fn accepted_iff_type_size_and_room_all_hold() {
        let cases = [
            ("image/jpeg", 100, true),
            ("image/png", 50 * MB, true),
            ("image/png", 50 * MB + 1, false),
            ("application/pdf", 100, false),
            ("image/webp", 0, true),
            ("image/gif", 0, false),
        ];
        for (mime, size, expected) in cases {
            let mut staging = StagingArea::new(5);
            let outcome = staging.stage(
                [Candidate::new("x", mime, vec![0u8; size])],
                FileCategory::ProgressPhotos,
                ConstructionPhase::Roofing,
            );
            assert_eq!(outcome.staged.len() == 1, expected, "{mime} {size}");
            assert_eq!(outcome.staged.len() + outcome.rejected.len(), 1);
        }
    }

    #[test]
    fn drain_empties_the_staging_list() {
        let mut staging = StagingArea::new(5);
        staging.stage(
            [jpeg("a.jpg", 10)],
            FileCategory::ProgressPhotos,
            ConstructionPhase::Design,
        );
        assert_eq!(staging.drain().len(), 1);
        assert!(staging.is_empty());
    }

    #[test]
    fn blank_names_fall_back_to_upload() {
        assert_eq!(Candidate::new("  ", "text/plain", "x").original_name, "upload");
    }
}
