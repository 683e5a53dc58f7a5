//! Upload intake, the simulated upload pipeline and the stores behind them.

pub mod blob_store;
pub mod clock;
pub mod environment;
pub mod file_service;
pub mod intake;
pub mod pipeline;
pub mod progress_board;
pub mod registry;
pub mod tagging;
