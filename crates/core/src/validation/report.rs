//! Grouping, summarizing and rendering findings for display.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::EntityKind;

use super::finding::{FindingKind, Severity, ValidationFinding};

/// Findings partitioned and grouped for a preview screen.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FindingReport {
    pub blocking: Vec<ValidationFinding>,
    pub advisory: Vec<ValidationFinding>,
}

/// Error and warning counts for one sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetCounts {
    pub errors: usize,
    pub warnings: usize,
}

impl FindingReport {
    /// Partition findings into blocking (errors) and advisory (warnings),
    /// keeping their original order within each partition.
    pub fn new(findings: Vec<ValidationFinding>) -> Self {
        let (blocking, advisory): (Vec<_>, Vec<_>) = findings
            .into_iter()
            .partition(ValidationFinding::is_blocking);
        Self { blocking, advisory }
    }

    /// The import may only be submitted when nothing blocks it.
    pub fn is_submittable(&self) -> bool {
        self.blocking.is_empty()
    }

    pub fn total(&self) -> usize {
        self.blocking.len() + self.advisory.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.blocking.iter().chain(self.advisory.iter())
    }

    /// Findings grouped by kind, kinds in a stable order.
    pub fn by_kind(&self) -> BTreeMap<FindingKind, Vec<&ValidationFinding>> {
        let mut groups: BTreeMap<FindingKind, Vec<&ValidationFinding>> = BTreeMap::new();
        for finding in self.iter() {
            groups.entry(finding.kind).or_default().push(finding);
        }
        groups
    }

    /// Findings grouped by sheet and row, so a row's problems read together.
    pub fn by_row(&self) -> BTreeMap<(EntityKind, usize), Vec<&ValidationFinding>> {
        let mut groups: BTreeMap<(EntityKind, usize), Vec<&ValidationFinding>> = BTreeMap::new();
        for finding in self.iter() {
            groups
                .entry((finding.sheet, finding.row))
                .or_default()
                .push(finding);
        }
        groups
    }

    pub fn counts_by_sheet(&self) -> BTreeMap<EntityKind, SheetCounts> {
        let mut counts: BTreeMap<EntityKind, SheetCounts> = BTreeMap::new();
        for finding in &self.blocking {
            counts.entry(finding.sheet).or_default().errors += 1;
        }
        for finding in &self.advisory {
            counts.entry(finding.sheet).or_default().warnings += 1;
        }
        counts
    }

    /// Short multi-line summary: one headline, then one line per kind.
    pub fn summarize(&self) -> String {
        if self.total() == 0 {
            return "No problems found".to_string();
        }

        let mut lines = vec![format!(
            "{} error(s), {} warning(s){}",
            self.blocking.len(),
            self.advisory.len(),
            if self.is_submittable() {
                ""
            } else {
                " - fix the errors before importing"
            }
        )];
        for (kind, findings) in self.by_kind() {
            lines.push(format!("  {}: {}", kind.label(), findings.len()));
        }
        lines.join("\n")
    }
}

/// Render one finding on a single line.
///
/// ```text
/// [error] Departments row 3, parent_dept_code: Circular reference detected: A → B → A (Break the loop ...)
/// ```
pub fn format_finding(finding: &ValidationFinding) -> String {
    let severity = match finding.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let location = if finding.row == 0 {
        format!("{} header", finding.sheet.sheet_name())
    } else {
        format!("{} row {}", finding.sheet.sheet_name(), finding.row)
    };
    let column = finding
        .column
        .as_deref()
        .map(|c| format!(", {c}"))
        .unwrap_or_default();
    let suggestion = finding
        .suggestion
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();

    format!(
        "[{severity}] {location}{column}: {}{suggestion}",
        finding.message
    )
}
