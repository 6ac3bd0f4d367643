//! Aggregate counts for the preview and success screens.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::batching::ImportErrorEntry;
use crate::classifier::{ClassifiedOperation, ImportPreview, Operation};
use crate::rows::{DepartmentRow, PositionRow};
use crate::types::EntityKind;

/// Creates and updates for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub create: usize,
    pub update: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.create + self.update
    }

    fn record(&mut self, operation: Operation) {
        match operation {
            Operation::Create => self.create += 1,
            Operation::Update => self.update += 1,
        }
    }

    fn from_operations<R>(ops: &[ClassifiedOperation<R>]) -> Self {
        let mut counts = Self::default();
        for op in ops {
            counts.record(op.operation);
        }
        counts
    }
}

/// Preview totals, derived from the classified operations and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub departments: EntityCounts,
    pub positions: EntityCounts,
}

impl ImportSummary {
    pub fn from_operations(
        departments: &[ClassifiedOperation<DepartmentRow>],
        positions: &[ClassifiedOperation<PositionRow>],
    ) -> Self {
        Self {
            total_rows: departments.len() + positions.len(),
            departments: EntityCounts::from_operations(departments),
            positions: EntityCounts::from_operations(positions),
        }
    }

    pub fn for_entity(&self, entity: EntityKind) -> EntityCounts {
        match entity {
            EntityKind::Department => self.departments,
            EntityKind::Position => self.positions,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Final counts for the success screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub departments_created: usize,
    pub departments_updated: usize,
    pub positions_created: usize,
    pub positions_updated: usize,
    pub failed: usize,
    pub failures: Vec<ImportErrorEntry>,
}

impl ImportResult {
    /// Build the result from the ids the controller reported as applied.
    ///
    /// Only operations whose item id is in `succeeded_ids` are counted;
    /// everything else that failed is carried over from `failures`.
    pub fn from_outcome(
        preview: &ImportPreview,
        succeeded_ids: &HashSet<String>,
        failures: Vec<ImportErrorEntry>,
    ) -> Self {
        let mut result = Self {
            failed: failures.len(),
            failures,
            ..Self::default()
        };

        for (entity, operation, id) in preview.operations() {
            if !succeeded_ids.contains(&id) {
                continue;
            }
            let slot = match (entity, operation) {
                (EntityKind::Department, Operation::Create) => &mut result.departments_created,
                (EntityKind::Department, Operation::Update) => &mut result.departments_updated,
                (EntityKind::Position, Operation::Create) => &mut result.positions_created,
                (EntityKind::Position, Operation::Update) => &mut result.positions_updated,
            };
            *slot += 1;
        }

        result
    }

    /// Operations that actually reached the remote service.
    pub fn applied(&self) -> usize {
        self.departments_created
            + self.departments_updated
            + self.positions_created
            + self.positions_updated
    }

    pub fn created(&self) -> usize {
        self.departments_created + self.positions_created
    }

    pub fn updated(&self) -> usize {
        self.departments_updated + self.positions_updated
    }

    /// Some operations applied and some failed permanently.
    pub fn is_partial(&self) -> bool {
        self.applied() > 0 && self.failed > 0
    }
}

/// Human-readable one-liner, e.g. "3 created, 1 updated, 2 failed".
pub fn describe_result(result: &ImportResult) -> String {
    let mut text = format!("{} created, {} updated", result.created(), result.updated());
    if result.failed > 0 {
        text.push_str(&format!(", {} failed", result.failed));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::ParsedWorkbook;
    use crate::types::ExistingKeys;

    fn dept(code: &str, row: usize) -> DepartmentRow {
        DepartmentRow {
            code: code.to_string(),
            name: code.to_string(),
            parent_code: None,
            metadata: None,
            source_row: row,
        }
    }

    fn pos(code: &str, row: usize) -> PositionRow {
        PositionRow {
            code: code.to_string(),
            title: code.to_string(),
            dept_code: "D1".to_string(),
            reports_to_code: None,
            is_manager: false,
            is_active: true,
            incumbents_count: 1,
            source_row: row,
        }
    }

    fn preview() -> ImportPreview {
        let workbook = ParsedWorkbook {
            departments: vec![dept("D1", 1), dept("D2", 2)],
            positions: vec![pos("P1", 1), pos("P2", 2), pos("P3", 3)],
            ..Default::default()
        };
        let existing = ExistingKeys::new(
            ["D1".to_string()].into_iter().collect(),
            ["P3".to_string()].into_iter().collect(),
        );
        ImportPreview::build(&workbook, &existing)
    }

    // -- ImportSummary --------------------------------------------------------

    #[test]
    fn summary_counts_operations() {
        let summary = preview().summary;
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.departments, EntityCounts { create: 1, update: 1 });
        assert_eq!(summary.positions, EntityCounts { create: 2, update: 1 });
        assert_eq!(summary.for_entity(EntityKind::Position).total(), 3);
    }

    // -- ImportResult ---------------------------------------------------------

    #[test]
    fn result_counts_only_succeeded_ids() {
        let preview = preview();
        let succeeded: HashSet<String> = [
            "department:1:D1".to_string(),
            "department:2:D2".to_string(),
            "position:3:P3".to_string(),
        ]
        .into_iter()
        .collect();
        let failures = vec![ImportErrorEntry {
            item_id: "position:1:P1".to_string(),
            item_type: "position.create".to_string(),
            error: "timeout".to_string(),
            attempts: 3,
        }];

        let result = ImportResult::from_outcome(&preview, &succeeded, failures);

        assert_eq!(result.departments_created, 1);
        assert_eq!(result.departments_updated, 1);
        assert_eq!(result.positions_created, 0);
        assert_eq!(result.positions_updated, 1);
        assert_eq!(result.applied(), 3);
        assert_eq!(result.failed, 1);
        assert!(result.is_partial());
        assert_eq!(describe_result(&result), "1 created, 2 updated, 1 failed");
    }

    #[test]
    fn nothing_applied() {
        let result = ImportResult::from_outcome(&preview(), &HashSet::new(), Vec::new());
        assert_eq!(result.applied(), 0);
        assert!(!result.is_partial());
        assert_eq!(describe_result(&result), "0 created, 0 updated");
    }
}
