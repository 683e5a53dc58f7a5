//! Core data models for the project file service.
//!
//! These types describe categories and phases, completed uploads, in-flight
//! progress and the browser view over the registry. They serialize naturally
//! as JSON via `serde`.

pub mod browser;
pub mod category;
pub mod phase;
pub mod progress;
pub mod project_file;
