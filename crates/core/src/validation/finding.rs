//! Validation finding types.

use serde::{Deserialize, Serialize};

use crate::types::EntityKind;

/// Whether a finding blocks the import or is informational.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error taxonomy shared by findings and execution failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid workbook structure. Fatal before validation.
    Structural,
    /// Per-row problems. Errors block submission, warnings do not.
    Validation,
    /// Dangling or circular references. Always blocking.
    Reference,
    /// A batch item failed against the remote service.
    Execution,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Validation => "validation",
            Self::Reference => "reference",
            Self::Execution => "execution",
        }
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingField,
    InvalidValue,
    InvalidJson,
    UnknownColumn,
    DuplicateCode,
    MissingReference,
    CircularReference,
    InactiveReference,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidValue => "invalid_value",
            Self::InvalidJson => "invalid_json",
            Self::UnknownColumn => "unknown_column",
            Self::DuplicateCode => "duplicate_code",
            Self::MissingReference => "missing_reference",
            Self::CircularReference => "circular_reference",
            Self::InactiveReference => "inactive_reference",
        }
    }

    /// Human-readable label used when grouping findings for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingField => "Missing required field",
            Self::InvalidValue => "Invalid value",
            Self::InvalidJson => "Invalid JSON",
            Self::UnknownColumn => "Unknown column",
            Self::DuplicateCode => "Duplicate code",
            Self::MissingReference => "Missing reference",
            Self::CircularReference => "Circular reference",
            Self::InactiveReference => "Inactive reference",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingReference | Self::CircularReference => ErrorCategory::Reference,
            _ => ErrorCategory::Validation,
        }
    }

    /// Remediation hint attached to new findings unless overridden.
    pub fn default_suggestion(&self) -> &'static str {
        match self {
            Self::MissingField => "Fill in the empty cell",
            Self::InvalidValue => "Correct the cell to the expected type",
            Self::InvalidJson => "Enter valid JSON, e.g. {\"key\": \"value\"}, or leave the cell empty",
            Self::UnknownColumn => "Remove or rename the column; it will be ignored",
            Self::DuplicateCode => "Give each row a unique code or remove the duplicate row",
            Self::MissingReference => {
                "Add the referenced row to the file or use a code that already exists"
            }
            Self::CircularReference => "Break the loop by changing one of the parent codes",
            Self::InactiveReference => "Point the row at an active position or reactivate it",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured validation result.
///
/// Constructed via [`ValidationFinding::error`] or
/// [`ValidationFinding::warning`] and enriched with the `with_*` builder
/// methods. `row` is the 1-based data row; `0` refers to the header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub sheet: EntityKind,
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_keys: Vec<String>,
}

impl ValidationFinding {
    fn new(
        kind: FindingKind,
        severity: Severity,
        sheet: EntityKind,
        row: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            category: kind.category(),
            sheet,
            row,
            column: None,
            field: None,
            value: None,
            message: message.into(),
            suggestion: Some(kind.default_suggestion().to_string()),
            affected_keys: Vec::new(),
        }
    }

    /// A blocking finding.
    pub fn error(
        kind: FindingKind,
        sheet: EntityKind,
        row: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::new(kind, Severity::Error, sheet, row, message)
    }

    /// An advisory finding.
    pub fn warning(
        kind: FindingKind,
        sheet: EntityKind,
        row: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::new(kind, Severity::Warning, sheet, row, message)
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_affected_keys(mut self, keys: Vec<String>) -> Self {
        self.affected_keys = keys;
        self
    }

    /// Blocking findings make the import non-submittable.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}
