#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The uploaded workbook is unusable (missing sheets or columns).
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
