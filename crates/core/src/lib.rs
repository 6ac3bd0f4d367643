//! Pure logic for the organization import engine.
//!
//! Everything in this crate is synchronous and free of I/O: row parsing,
//! hierarchy validation, create/update classification, reorganization
//! checks, batching arithmetic and the import workflow state machine.
//! The async batch controller lives in `orgimport-pipeline`.

pub mod batching;
pub mod classifier;
pub mod error;
pub mod reorg;
pub mod rows;
pub mod summary;
pub mod types;
pub mod validation;
pub mod workflow;
