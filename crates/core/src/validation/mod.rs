//! Import validation engine.
//!
//! Provides the finding model, generic hierarchy (cycle) checks, row-level
//! rules and report formatting. [`validate_workbook`] runs every check over
//! a parsed workbook and returns the complete list of findings; it never
//! stops at the first problem.

pub mod finding;
pub mod graph;
pub mod report;
pub mod rules;

use crate::rows::ParsedWorkbook;
use crate::types::ExistingKeys;

use finding::ValidationFinding;
use rules::ReferenceIndex;

/// Run every structural and referential check over a parsed workbook.
///
/// Parser findings are carried over unchanged. The result is ordered by
/// sheet (departments first) then by source row; findings on the same row
/// keep the order in which the checks produced them.
pub fn validate_workbook(
    workbook: &ParsedWorkbook,
    existing: &ExistingKeys,
) -> Vec<ValidationFinding> {
    let mut findings = workbook.findings.clone();
    let index = ReferenceIndex::new(workbook, existing);

    findings.extend(rules::validate_required_fields(&workbook.departments));
    findings.extend(rules::validate_duplicate_codes(&workbook.departments));
    findings.extend(rules::validate_references(&workbook.departments, &index));
    findings.extend(graph::validate_circular_references(&workbook.departments));

    findings.extend(rules::validate_required_fields(&workbook.positions));
    findings.extend(rules::validate_duplicate_codes(&workbook.positions));
    findings.extend(rules::validate_references(&workbook.positions, &index));
    findings.extend(graph::validate_circular_references(&workbook.positions));
    findings.extend(rules::validate_inactive_reports_to(&workbook.positions));

    findings.sort_by_key(|f| (f.sheet, f.row));
    findings
}
