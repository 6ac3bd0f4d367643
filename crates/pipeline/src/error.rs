use orgimport_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The record store could not be queried or written.
    #[error("Record store error: {0}")]
    Store(String),

    /// A processor call failed as a whole.
    #[error("Processor error: {0}")]
    Processor(String),
}
