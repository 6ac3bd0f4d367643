//! Async orchestration for organization imports.
//!
//! [`controller::BatchImportController`] applies batch items through a
//! [`controller::BatchProcessor`] with retry, pause/resume and
//! cancellation, publishing status snapshots as it goes.
//! [`session::ImportSession`] drives one uploaded workbook from bytes to a
//! final result against a [`store::RecordStore`].

pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod source;
pub mod status;
pub mod store;
