//! Step machine for a single uploaded file.
//!
//! ```text
//! Idle -> Uploading -> Parsing -> Preview -> Confirming -> Success
//!                                                       -> NoChanges
//!   any non-idle step ------------------------------------> Error
//!   any step --- cancel / reset --------------------------> Idle
//! ```
//!
//! Every transition swaps in a complete new step value. A rejected
//! transition returns an error and leaves the current step as it was.

use serde::{Deserialize, Serialize};

use crate::classifier::ImportPreview;
use crate::error::CoreError;
use crate::summary::ImportResult;
use crate::validation::finding::ErrorCategory;

/// What to do when confirmation succeeds but nothing was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAppliedPolicy {
    /// Treat it as an error: the remote service may have silently dropped
    /// every write.
    #[default]
    Error,
    /// Finish in a distinct `NoChanges` step.
    NoChanges,
}

/// Message used when a confirmed import applied nothing.
pub const ZERO_APPLIED_MESSAGE: &str = "No operations were applied";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ImportStep {
    Idle,
    Uploading {
        file_name: String,
    },
    Parsing {
        file_name: String,
        #[serde(skip)]
        buffer: Vec<u8>,
    },
    Preview {
        file_name: String,
        preview: Box<ImportPreview>,
    },
    Confirming {
        file_name: String,
        preview: Box<ImportPreview>,
    },
    Success {
        file_name: String,
        result: ImportResult,
    },
    NoChanges {
        file_name: String,
    },
    Error {
        category: ErrorCategory,
        message: String,
    },
}

impl ImportStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading { .. } => "uploading",
            Self::Parsing { .. } => "parsing",
            Self::Preview { .. } => "preview",
            Self::Confirming { .. } => "confirming",
            Self::Success { .. } => "success",
            Self::NoChanges { .. } => "no_changes",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::NoChanges { .. } | Self::Error { .. }
        )
    }
}

/// Owns the current [`ImportStep`] and enforces the transition guards.
#[derive(Debug, Clone)]
pub struct ImportWorkflow {
    step: ImportStep,
    policy: ZeroAppliedPolicy,
}

impl Default for ImportWorkflow {
    fn default() -> Self {
        Self::new(ZeroAppliedPolicy::default())
    }
}

impl ImportWorkflow {
    pub fn new(policy: ZeroAppliedPolicy) -> Self {
        Self {
            step: ImportStep::Idle,
            policy,
        }
    }

    pub fn step(&self) -> &ImportStep {
        &self.step
    }

    pub fn policy(&self) -> ZeroAppliedPolicy {
        self.policy
    }

    /// The uploaded bytes, while parsing.
    pub fn buffer(&self) -> Option<&[u8]> {
        match &self.step {
            ImportStep::Parsing { buffer, .. } => Some(buffer.as_slice()),
            _ => None,
        }
    }

    /// The preview, while previewing or confirming.
    pub fn preview(&self) -> Option<&ImportPreview> {
        match &self.step {
            ImportStep::Preview { preview, .. } | ImportStep::Confirming { preview, .. } => {
                Some(&**preview)
            }
            _ => None,
        }
    }

    // -- transitions ----------------------------------------------------------

    pub fn start_upload(&mut self, file_name: impl Into<String>) -> Result<&ImportStep, CoreError> {
        if !matches!(self.step, ImportStep::Idle) {
            return Err(invalid(&self.step, "start an upload"));
        }
        self.step = ImportStep::Uploading {
            file_name: file_name.into(),
        };
        Ok(&self.step)
    }

    /// Move to parsing. Requires a non-empty buffer.
    pub fn upload_complete(&mut self, buffer: Vec<u8>) -> Result<&ImportStep, CoreError> {
        let ImportStep::Uploading { file_name } = &self.step else {
            return Err(invalid(&self.step, "finish an upload"));
        };
        if buffer.is_empty() {
            return Err(CoreError::Structural(format!("'{file_name}' is empty")));
        }
        self.step = ImportStep::Parsing {
            file_name: file_name.clone(),
            buffer,
        };
        Ok(&self.step)
    }

    pub fn parsed(&mut self, preview: ImportPreview) -> Result<&ImportStep, CoreError> {
        let ImportStep::Parsing { file_name, .. } = &self.step else {
            return Err(invalid(&self.step, "show a preview"));
        };
        self.step = ImportStep::Preview {
            file_name: file_name.clone(),
            preview: Box::new(preview),
        };
        Ok(&self.step)
    }

    /// Move to confirming. Rejected while any blocking finding remains.
    pub fn confirm(&mut self) -> Result<&ImportStep, CoreError> {
        let ImportStep::Preview { preview, .. } = &self.step else {
            return Err(invalid(&self.step, "confirm"));
        };
        let blocking = preview.blocking_count();
        if blocking > 0 {
            return Err(CoreError::Validation(format!(
                "{blocking} blocking finding(s) must be fixed before importing"
            )));
        }

        match std::mem::replace(&mut self.step, ImportStep::Idle) {
            ImportStep::Preview { file_name, preview } => {
                self.step = ImportStep::Confirming { file_name, preview };
            }
            other => self.step = other,
        }
        Ok(&self.step)
    }

    /// Record the execution result. At least one applied operation is
    /// required for `Success`; otherwise the zero-applied policy decides.
    pub fn complete(&mut self, result: ImportResult) -> Result<&ImportStep, CoreError> {
        let ImportStep::Confirming { file_name, .. } = &self.step else {
            return Err(invalid(&self.step, "complete"));
        };
        let file_name = file_name.clone();

        self.step = if result.applied() > 0 {
            ImportStep::Success { file_name, result }
        } else {
            match self.policy {
                ZeroAppliedPolicy::Error => ImportStep::Error {
                    category: ErrorCategory::Execution,
                    message: zero_applied_message(&result),
                },
                ZeroAppliedPolicy::NoChanges => ImportStep::NoChanges { file_name },
            }
        };
        Ok(&self.step)
    }

    /// Fail from any in-progress step.
    pub fn fail(
        &mut self,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Result<&ImportStep, CoreError> {
        if matches!(self.step, ImportStep::Idle) || self.step.is_terminal() {
            return Err(invalid(&self.step, "fail"));
        }
        self.step = ImportStep::Error {
            category,
            message: message.into(),
        };
        Ok(&self.step)
    }

    /// Abandon whatever is in progress.
    pub fn cancel(&mut self) -> &ImportStep {
        self.step = ImportStep::Idle;
        &self.step
    }

    /// Return to idle after a terminal step.
    pub fn reset(&mut self) -> &ImportStep {
        self.step = ImportStep::Idle;
        &self.step
    }
}

fn invalid(step: &ImportStep, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        from: step.name(),
        action,
    }
}

fn zero_applied_message(result: &ImportResult) -> String {
    if result.failed > 0 {
        format!("{ZERO_APPLIED_MESSAGE} ({} failed)", result.failed)
    } else {
        ZERO_APPLIED_MESSAGE.to_string()
    }
}
