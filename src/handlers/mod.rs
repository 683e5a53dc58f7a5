//! HTTP handlers. Each one extracts `State<FileService>` and maps service
//! results onto the JSON envelope or an `AppError`.

pub mod catalog_handlers;
pub mod envelope;
pub mod file_handlers;
pub mod health_handlers;
