//! Row-level structural and referential rules.

use std::collections::{HashMap, HashSet};

use crate::rows::{ImportRow, ParsedWorkbook, PositionRow, COL_REPORTS_TO};
use crate::types::{EntityKind, ExistingKeys};

use super::finding::{FindingKind, ValidationFinding};

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

/// Flag every repeat of a code after its first occurrence.
///
/// The first row with a given code wins; each later row gets one blocking
/// finding pointing back at that first row. Empty codes are left to
/// [`validate_required_fields`].
pub fn validate_duplicate_codes<R: ImportRow>(rows: &[R]) -> Vec<ValidationFinding> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut findings = Vec::new();

    for row in rows {
        let code = row.code();
        if code.is_empty() {
            continue;
        }
        match first_seen.get(code) {
            Some(&first_row) => findings.push(
                ValidationFinding::error(
                    FindingKind::DuplicateCode,
                    R::ENTITY,
                    row.source_row(),
                    format!("Duplicate code '{code}' (first used in row {first_row})"),
                )
                .with_column(R::CODE_COLUMN)
                .with_field("code")
                .with_value(code)
                .with_affected_keys(vec![code.to_string()]),
            ),
            None => {
                first_seen.insert(code, row.source_row());
            }
        }
    }

    findings
}

// ---------------------------------------------------------------------------
// Required fields
// ---------------------------------------------------------------------------

/// Check non-empty required fields and JSON-parseable free-form fields.
pub fn validate_required_fields<R: ImportRow>(rows: &[R]) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    for row in rows {
        for field in row.required_fields() {
            if field.value.map_or(true, |v| v.trim().is_empty()) {
                findings.push(
                    ValidationFinding::error(
                        FindingKind::MissingField,
                        R::ENTITY,
                        row.source_row(),
                        format!("{} is required", field.column),
                    )
                    .with_column(field.column)
                    .with_field(field.field),
                );
            }
        }

        for field in row.json_fields() {
            let Some(text) = field.value else {
                continue;
            };
            if let Err(e) = serde_json::from_str::<serde_json::Value>(text) {
                findings.push(
                    ValidationFinding::error(
                        FindingKind::InvalidJson,
                        R::ENTITY,
                        row.source_row(),
                        format!("{} is not valid JSON: {e}", field.column),
                    )
                    .with_column(field.column)
                    .with_field(field.field)
                    .with_value(text),
                );
            }
        }
    }

    findings
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Every code a reference may legally point at: in-file codes plus codes
/// already persisted by the remote service.
#[derive(Debug)]
pub struct ReferenceIndex<'a> {
    departments: HashSet<&'a str>,
    positions: HashSet<&'a str>,
    existing: &'a ExistingKeys,
}

impl<'a> ReferenceIndex<'a> {
    pub fn new(workbook: &'a ParsedWorkbook, existing: &'a ExistingKeys) -> Self {
        Self {
            departments: codes(&workbook.departments),
            positions: codes(&workbook.positions),
            existing,
        }
    }

    pub fn contains(&self, entity: EntityKind, key: &str) -> bool {
        let in_file = match entity {
            EntityKind::Department => &self.departments,
            EntityKind::Position => &self.positions,
        };
        in_file.contains(key) || self.existing.for_entity(entity).contains(key)
    }
}

fn codes<R: ImportRow>(rows: &[R]) -> HashSet<&str> {
    rows.iter()
        .map(|r| r.code())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Every non-null reference must resolve to an in-file or persisted code.
pub fn validate_references<R: ImportRow>(
    rows: &[R],
    index: &ReferenceIndex<'_>,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    for row in rows {
        for reference in row.references() {
            if index.contains(reference.target, reference.key) {
                continue;
            }
            findings.push(
                ValidationFinding::error(
                    FindingKind::MissingReference,
                    R::ENTITY,
                    row.source_row(),
                    format!(
                        "{} '{}' does not match any {} in the file or already saved",
                        reference.column,
                        reference.key,
                        reference.target.as_str()
                    ),
                )
                .with_column(reference.column)
                .with_field(reference.field)
                .with_value(reference.key)
                .with_affected_keys(vec![reference.key.to_string()]),
            );
        }
    }

    findings
}

/// Warn when a position reports to a position marked inactive in the file.
pub fn validate_inactive_reports_to(rows: &[PositionRow]) -> Vec<ValidationFinding> {
    let mut active: HashMap<&str, bool> = HashMap::new();
    for row in rows {
        active.entry(row.code.as_str()).or_insert(row.is_active);
    }

    rows.iter()
        .filter_map(|row| {
            let target = row.reports_to_code.as_deref()?;
            if target == row.code || active.get(target).copied().unwrap_or(true) {
                return None;
            }
            Some(
                ValidationFinding::warning(
                    FindingKind::InactiveReference,
                    EntityKind::Position,
                    row.source_row,
                    format!("Position reports to '{target}', which is inactive"),
                )
                .with_column(COL_REPORTS_TO)
                .with_field("reports_to_code")
                .with_value(target)
                .with_affected_keys(vec![target.to_string()]),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::DepartmentRow;

    fn dept(code: &str, parent: Option<&str>, row: usize) -> DepartmentRow {
        DepartmentRow {
            code: code.to_string(),
            name: format!("Dept {code}"),
            parent_code: parent.map(str::to_string),
            metadata: None,
            source_row: row,
        }
    }

    fn pos(code: &str, reports_to: Option<&str>, active: bool, row: usize) -> PositionRow {
        PositionRow {
            code: code.to_string(),
            title: "Title".to_string(),
            dept_code: "D".to_string(),
            reports_to_code: reports_to.map(str::to_string),
            is_manager: false,
            is_active: active,
            incumbents_count: 0,
            source_row: row,
        }
    }

    // -- validate_duplicate_codes ---------------------------------------------

    #[test]
    fn duplicate_points_back_to_first_row() {
        let rows = vec![dept("D1", None, 1), dept("D1", None, 2)];
        let findings = validate_duplicate_codes(&rows);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DuplicateCode);
        assert_eq!(findings[0].row, 2);
        assert!(findings[0].message.contains("row 1"));
    }

    #[test]
    fn every_later_occurrence_is_flagged() {
        let rows = vec![dept("D1", None, 1), dept("D1", None, 2), dept("D1", None, 5)];
        let findings = validate_duplicate_codes(&rows);
        let rows: Vec<usize> = findings.iter().map(|f| f.row).collect();
        assert_eq!(rows, vec![2, 5]);
        assert!(findings.iter().all(|f| f.message.contains("row 1")));
    }

    #[test]
    fn codes_are_case_sensitive() {
        let rows = vec![dept("d1", None, 1), dept("D1", None, 2)];
        assert!(validate_duplicate_codes(&rows).is_empty());
    }

    // -- validate_required_fields ---------------------------------------------

    #[test]
    fn empty_required_fields_are_reported() {
        let mut row = dept("", None, 3);
        row.name = "  ".to_string();
        let findings = validate_required_fields(&[row]);

        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.kind == FindingKind::MissingField));
        assert_eq!(findings[0].column.as_deref(), Some("dept_code"));
    }

    #[test]
    fn invalid_metadata_json_is_reported() {
        let mut good = dept("A", None, 1);
        good.metadata = Some("{\"floor\": 3}".to_string());
        let mut bad = dept("B", None, 2);
        bad.metadata = Some("{floor: 3".to_string());

        let findings = validate_required_fields(&[good, bad]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::InvalidJson);
        assert_eq!(findings[0].row, 2);
    }

    // -- validate_references --------------------------------------------------

    #[test]
    fn dangling_parent_is_reported() {
        let workbook = ParsedWorkbook {
            departments: vec![dept("A", None, 1), dept("B", Some("Z"), 2)],
            ..Default::default()
        };
        let existing = ExistingKeys::default();
        let index = ReferenceIndex::new(&workbook, &existing);
        let findings = validate_references(&workbook.departments, &index);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::MissingReference);
        assert_eq!(findings[0].affected_keys, vec!["Z".to_string()]);
        assert!(findings[0].is_blocking());
    }

    #[test]
    fn persisted_codes_resolve_references() {
        let workbook = ParsedWorkbook {
            departments: vec![dept("B", Some("Z"), 1)],
            ..Default::default()
        };
        let existing = ExistingKeys::new(["Z".to_string()].into_iter().collect(), HashSet::new());
        let index = ReferenceIndex::new(&workbook, &existing);
        assert!(validate_references(&workbook.departments, &index).is_empty());
    }

    #[test]
    fn position_department_must_exist() {
        let workbook = ParsedWorkbook {
            departments: vec![dept("ENG", None, 1)],
            positions: vec![pos("P1", None, true, 1)],
            ..Default::default()
        };
        let existing = ExistingKeys::default();
        let index = ReferenceIndex::new(&workbook, &existing);
        let findings = validate_references(&workbook.positions, &index);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].column.as_deref(), Some("dept_code"));
    }

    // -- validate_inactive_reports_to -----------------------------------------

    #[test]
    fn reporting_to_inactive_position_warns() {
        let rows = vec![pos("BOSS", None, false, 1), pos("DEV", Some("BOSS"), true, 2)];
        let findings = validate_inactive_reports_to(&rows);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].row, 2);
        assert!(!findings[0].is_blocking());
    }
}
