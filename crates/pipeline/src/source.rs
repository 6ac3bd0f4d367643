//! Decoding uploaded workbook bytes into raw sheets.
//!
//! The engine accepts the JSON export of a workbook: one array of row
//! objects per sheet, keyed by column header.
//!
//! ```json
//! {
//!   "departments": [{ "dept_code": "HQ", "name": "Head Office" }],
//!   "positions":   [{ "pos_code": "CEO", "title": "Chief", "dept_code": "HQ" }]
//! }
//! ```
//!
//! Sheet keys are matched case-insensitively against the entity and sheet
//! names, so `"Departments"` works as well as `"departments"`.

use orgimport_core::error::CoreError;
use orgimport_core::rows::{parse_workbook, ParsedWorkbook, RawRow, RawSheet};
use orgimport_core::types::EntityKind;
use serde_json::Value;

/// Raw sheets found in an uploaded workbook.
#[derive(Debug, Clone, Default)]
pub struct RawWorkbook {
    pub departments: Option<RawSheet>,
    pub positions: Option<RawSheet>,
}

impl RawWorkbook {
    /// Parse both sheets into typed rows.
    pub fn parse(&self) -> Result<ParsedWorkbook, CoreError> {
        parse_workbook(self.departments.as_ref(), self.positions.as_ref())
    }
}

/// Decode a JSON workbook export.
pub fn decode_workbook(bytes: &[u8]) -> Result<RawWorkbook, CoreError> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::Structural(format!("Workbook is not valid JSON: {e}")))?;
    let Value::Object(sheets) = root else {
        return Err(CoreError::Structural(
            "Workbook must be a JSON object of sheets".to_string(),
        ));
    };

    let mut workbook = RawWorkbook::default();
    for (key, value) in sheets {
        let Some(entity) = sheet_entity(&key) else {
            continue;
        };
        let sheet = decode_sheet(entity, value)?;
        match entity {
            EntityKind::Department => workbook.departments = Some(sheet),
            EntityKind::Position => workbook.positions = Some(sheet),
        }
    }
    Ok(workbook)
}

fn sheet_entity(key: &str) -> Option<EntityKind> {
    [EntityKind::Department, EntityKind::Position]
        .into_iter()
        .find(|entity| {
            key.eq_ignore_ascii_case(entity.sheet_name())
                || key.eq_ignore_ascii_case(entity.as_str())
        })
}

fn decode_sheet(entity: EntityKind, value: Value) -> Result<RawSheet, CoreError> {
    let name = entity.sheet_name();
    let Value::Array(rows) = value else {
        return Err(CoreError::Structural(format!(
            "{name} sheet must be an array of rows"
        )));
    };

    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(cells) => Ok::<RawRow, CoreError>(cells),
            _ => Err(CoreError::Structural(format!(
                "{name} row {} is not an object",
                i + 1
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawSheet::from_rows(name, rows))
}
