//! Per-file progress for an in-flight upload.
//!
//! Progress is driven by discrete events rather than timers so the state
//! machine can be stepped directly:
//!
//! ```text
//! uploading --Tick (x9)--> processing --Complete--> completed
//!     \                        |
//!      +--------Fail-----------+-----------------> error
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Progress added by a single tick.
pub const TICK_STEP: u8 = 10;

/// Highest value ticks can reach; the rest is granted on completion.
pub const TICK_CEILING: u8 = 90;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Tick,
    Complete,
    Fail(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("cannot apply {event:?} to an upload that is {status:?}")]
    InvalidTransition {
        status: UploadStatus,
        event: ProgressEvent,
    },
    #[error("no upload with id {0} is being tracked")]
    UnknownUpload(Uuid),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_id: Uuid,
    pub file_name: String,
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UploadProgress {
    pub fn new(file_id: Uuid, file_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            progress: 0,
            status: UploadStatus::Uploading,
            error: None,
            updated_at: now,
        }
    }

    /// Apply one event. Terminal states accept nothing further.
    pub fn apply(&mut self, event: ProgressEvent, now: DateTime<Utc>) -> Result<(), ProgressError> {
        match (self.status, event) {
            (UploadStatus::Uploading, ProgressEvent::Tick) => {
                self.progress = (self.progress + TICK_STEP).min(TICK_CEILING);
                if self.progress == TICK_CEILING {
                    self.status = UploadStatus::Processing;
                }
            }
            (UploadStatus::Processing, ProgressEvent::Complete) => {
                self.progress = 100;
                self.status = UploadStatus::Completed;
            }
            (UploadStatus::Uploading | UploadStatus::Processing, ProgressEvent::Fail(message)) => {
                self.status = UploadStatus::Error;
                self.error = Some(message);
            }
            (status, event) => return Err(ProgressError::InvalidTransition { status, event }),
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> UploadProgress {
        UploadProgress::new(Uuid::new_v4(), "site.jpg", Utc::now())
    }

    #[test]
    fn nine_ticks_reach_processing_at_ninety() {
        let mut p = fresh();
        for expected in (1..=8).map(|n| n * TICK_STEP) {
            p.apply(ProgressEvent::Tick, Utc::now()).unwrap();
            assert_eq!(p.progress, expected);
            assert_eq!(p.status, UploadStatus::Uploading);
        }
        p.apply(ProgressEvent::Tick, Utc::now()).unwrap();
        assert_eq!(p.progress, 90);
        assert_eq!(p.status, UploadStatus::Processing);
    }

    #[test]
    fn complete_jumps_to_one_hundred() {
        let mut p = fresh();
        for _ in 0..9 {
            p.apply(ProgressEvent::Tick, Utc::now()).unwrap();
        }
        p.apply(ProgressEvent::Complete, Utc::now()).unwrap();
        assert_eq!(p.progress, 100);
        assert_eq!(p.status, UploadStatus::Completed);
        assert!(p.is_terminal());
    }

    #[test]
    fn complete_before_processing_is_rejected() {
        let mut p = fresh();
        let err = p.apply(ProgressEvent::Complete, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ProgressError::InvalidTransition {
                status: UploadStatus::Uploading,
                event: ProgressEvent::Complete,
            }
        );
        assert_eq!(p.status, UploadStatus::Uploading);
    }

    #[test]
    fn tick_while_processing_is_rejected() {
        let mut p = fresh();
        for _ in 0..9 {
            p.apply(ProgressEvent::Tick, Utc::now()).unwrap();
        }
        assert!(p.apply(ProgressEvent::Tick, Utc::now()).is_err());
        assert_eq!(p.progress, 90);
    }

    #[test]
    fn fail_records_message_and_is_terminal() {
        let mut p = fresh();
        p.apply(ProgressEvent::Tick, Utc::now()).unwrap();
        p.apply(ProgressEvent::Fail("Upload failed".into()), Utc::now())
            .unwrap();
        assert_eq!(p.status, UploadStatus::Error);
        assert_eq!(p.error.as_deref(), Some("Upload failed"));
        assert!(p.apply(ProgressEvent::Tick, Utc::now()).is_err());
        assert!(p.apply(ProgressEvent::Complete, Utc::now()).is_err());
    }
}
