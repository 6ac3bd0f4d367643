//! Create/update classification and the import preview built on it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::batching::BatchImportItem;
use crate::rows::{DepartmentRow, ImportRow, ParsedWorkbook, PositionRow};
use crate::summary::ImportSummary;
use crate::types::{EntityKind, ExistingKeys};
use crate::validation::finding::ValidationFinding;
use crate::validation::report::FindingReport;
use crate::validation::validate_workbook;

/// What applying a row will do on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row paired with the operation it will perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedOperation<R> {
    pub row: R,
    pub operation: Operation,
}

impl<R: ImportRow> ClassifiedOperation<R> {
    /// Deterministic item id: entity, source row and code.
    pub fn item_id(&self) -> String {
        format!(
            "{}:{}:{}",
            R::ENTITY,
            self.row.source_row(),
            self.row.code()
        )
    }

    /// e.g. `"department.create"`.
    pub fn item_type(&self) -> String {
        format!("{}.{}", R::ENTITY, self.operation)
    }

    pub fn to_batch_item(&self) -> BatchImportItem {
        BatchImportItem::new(self.item_id(), self.item_type(), self.row.to_payload())
    }
}

/// Classify each row as create or update by exact membership of its code
/// in `existing`.
///
/// Output order equals input order. Duplicates are classified independently;
/// deduplication is reported by validation, not done here.
pub fn classify<R: ImportRow + Clone>(
    rows: &[R],
    existing: &HashSet<String>,
) -> Vec<ClassifiedOperation<R>> {
    rows.iter()
        .map(|row| ClassifiedOperation {
            row: row.clone(),
            operation: if existing.contains(row.code()) {
                Operation::Update
            } else {
                Operation::Create
            },
        })
        .collect()
}

/// Order operations so that every in-file parent is submitted before its
/// children. Operations at the same depth keep their input order.
///
/// Depth is measured within the file only; parents that already exist on
/// the server count as roots. A cycle (which validation blocks anyway)
/// stops the walk rather than looping.
pub fn submission_order<R: ImportRow>(
    ops: &[ClassifiedOperation<R>],
) -> Vec<&ClassifiedOperation<R>> {
    let mut parent_of: HashMap<&str, Option<&str>> = HashMap::new();
    for op in ops {
        parent_of
            .entry(op.row.code())
            .or_insert(op.row.parent_code());
    }

    let mut ordered: Vec<(usize, &ClassifiedOperation<R>)> = ops
        .iter()
        .map(|op| (in_file_depth(&parent_of, op.row.code()), op))
        .collect();
    ordered.sort_by_key(|(depth, _)| *depth);
    ordered.into_iter().map(|(_, op)| op).collect()
}

/// Number of in-file ancestors above `code`.
fn in_file_depth<'a>(parent_of: &HashMap<&'a str, Option<&'a str>>, code: &'a str) -> usize {
    let mut seen: HashSet<&str> = HashSet::from([code]);
    let mut depth = 0;
    let mut current = code;
    while let Some(&Some(parent)) = parent_of.get(current) {
        if !parent_of.contains_key(parent) || !seen.insert(parent) {
            break;
        }
        depth += 1;
        current = parent;
    }
    depth
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Everything a preview screen needs: classified operations, findings and
/// the summary derived from the operations.
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub departments: Vec<ClassifiedOperation<DepartmentRow>>,
    pub positions: Vec<ClassifiedOperation<PositionRow>>,
    pub findings: Vec<ValidationFinding>,
    pub summary: ImportSummary,
}

impl ImportPreview {
    /// Validate and classify a parsed workbook against persisted keys.
    pub fn build(workbook: &ParsedWorkbook, existing: &ExistingKeys) -> Self {
        let findings = validate_workbook(workbook, existing);
        let departments = classify(&workbook.departments, &existing.departments);
        let positions = classify(&workbook.positions, &existing.positions);
        let summary = ImportSummary::from_operations(&departments, &positions);

        Self {
            departments,
            positions,
            findings,
            summary,
        }
    }

    pub fn report(&self) -> FindingReport {
        FindingReport::new(self.findings.clone())
    }

    pub fn blocking_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_blocking()).count()
    }

    pub fn is_submittable(&self) -> bool {
        self.blocking_count() == 0
    }

    /// Batch items in submission order: departments (parents first), then
    /// positions (managers first).
    pub fn to_batch_items(&self) -> Vec<BatchImportItem> {
        submission_order(&self.departments)
            .into_iter()
            .map(ClassifiedOperation::to_batch_item)
            .chain(
                submission_order(&self.positions)
                    .into_iter()
                    .map(ClassifiedOperation::to_batch_item),
            )
            .collect()
    }

    /// `(entity, operation, item id)` for every classified row.
    pub fn operations(&self) -> impl Iterator<Item = (EntityKind, Operation, String)> + '_ {
        self.departments
            .iter()
            .map(|op| (EntityKind::Department, op.operation, op.item_id()))
            .chain(
                self.positions
                    .iter()
                    .map(|op| (EntityKind::Position, op.operation, op.item_id())),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(code: &str, parent: Option<&str>, row: usize) -> DepartmentRow {
        DepartmentRow {
            code: code.to_string(),
            name: format!("Dept {code}"),
            parent_code: parent.map(str::to_string),
            metadata: None,
            source_row: row,
        }
    }

    fn keys(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    // -- classify -------------------------------------------------------------

    #[test]
    fn classifies_by_exact_membership() {
        let rows = vec![dept("A", None, 1), dept("B", None, 2), dept("a", None, 3)];
        let ops = classify(&rows, &keys(&["A"]));
        let kinds: Vec<Operation> = ops.iter().map(|o| o.operation).collect();
        assert_eq!(kinds, vec![Operation::Update, Operation::Create, Operation::Create]);
    }

    #[test]
    fn no_trimming_during_classification() {
        let rows = vec![dept("A", None, 1)];
        let ops = classify(&rows, &keys(&["A "]));
        assert_eq!(ops[0].operation, Operation::Create);
    }

    #[test]
    fn duplicates_are_classified_independently() {
        let rows = vec![dept("D1", None, 1), dept("D1", None, 2)];
        let ops = classify(&rows, &HashSet::new());
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.operation == Operation::Create));
    }

    #[test]
    fn classification_is_order_preserving_and_idempotent() {
        let rows: Vec<DepartmentRow> = (0..50)
            .map(|i| dept(&format!("D{i}"), None, i + 1))
            .collect();
        let existing = keys(&["D3", "D17", "D40"]);

        let first = classify(&rows, &existing);
        let second = classify(&rows, &existing);
        assert_eq!(first, second);

        let codes: Vec<&str> = first.iter().map(|o| o.row.code.as_str()).collect();
        let expected: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, expected);
    }

    // -- submission_order -----------------------------------------------------

    #[test]
    fn parents_are_submitted_first() {
        let rows = vec![
            dept("C", Some("B"), 1),
            dept("B", Some("A"), 2),
            dept("A", None, 3),
            dept("X", Some("EXISTING"), 4),
        ];
        let ops = classify(&rows, &HashSet::new());
        let order: Vec<&str> = submission_order(&ops)
            .iter()
            .map(|o| o.row.code.as_str())
            .collect();
        assert_eq!(order, vec!["A", "X", "B", "C"]);
    }

    #[test]
    fn cyclic_input_does_not_hang() {
        let rows = vec![dept("A", Some("B"), 1), dept("B", Some("A"), 2)];
        let ops = classify(&rows, &HashSet::new());
        assert_eq!(submission_order(&ops).len(), 2);
    }

    // -- preview --------------------------------------------------------------

    #[test]
    fn preview_summarizes_and_blocks_on_duplicates() {
        let workbook = ParsedWorkbook {
            departments: vec![dept("D1", None, 1), dept("D1", None, 2)],
            ..Default::default()
        };
        let preview = ImportPreview::build(&workbook, &ExistingKeys::default());

        assert_eq!(preview.departments.len(), 2);
        assert_eq!(preview.summary.departments.create, 2);
        assert!(!preview.is_submittable());
        assert_eq!(preview.findings[0].row, 2);
        assert!(preview.findings[0].message.contains("row 1"));
    }

    #[test]
    fn batch_items_carry_type_and_payload() {
        let workbook = ParsedWorkbook {
            departments: vec![dept("ENG", Some("HQ"), 1), dept("HQ", None, 2)],
            ..Default::default()
        };
        let existing = ExistingKeys::new(keys(&["HQ"]), HashSet::new());
        let preview = ImportPreview::build(&workbook, &existing);
        let items = preview.to_batch_items();

        assert_eq!(items[0].id, "department:2:HQ");
        assert_eq!(items[0].item_type, "department.update");
        assert_eq!(items[1].item_type, "department.create");
        assert_eq!(items[1].payload["parent_code"], "HQ");
    }
}
