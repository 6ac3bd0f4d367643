//! Typed department and position rows, and the adapter that coerces raw
//! spreadsheet cells into them.
//!
//! The adapter owns type coercion only. Missing required values are left
//! empty here and reported by [`crate::validation::rules`]; cells that
//! cannot be coerced at all produce an `InvalidValue` finding and fall back
//! to the column default.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::types::EntityKind;
use crate::validation::finding::{FindingKind, ValidationFinding};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const COL_DEPT_CODE: &str = "dept_code";
pub const COL_DEPT_NAME: &str = "name";
pub const COL_PARENT_DEPT_CODE: &str = "parent_dept_code";
pub const COL_METADATA: &str = "metadata";

pub const COL_POS_CODE: &str = "pos_code";
pub const COL_TITLE: &str = "title";
pub const COL_REPORTS_TO: &str = "reports_to_pos_code";
pub const COL_IS_MANAGER: &str = "is_manager";
pub const COL_IS_ACTIVE: &str = "is_active";
pub const COL_INCUMBENTS: &str = "incumbents_count";

/// Every column the departments sheet understands.
pub const DEPARTMENT_COLUMNS: &[&str] = &[
    COL_DEPT_CODE,
    COL_DEPT_NAME,
    COL_PARENT_DEPT_CODE,
    COL_METADATA,
];

/// Columns whose absence makes the departments sheet unusable.
pub const DEPARTMENT_REQUIRED_COLUMNS: &[&str] = &[COL_DEPT_CODE, COL_DEPT_NAME];

/// Every column the positions sheet understands.
pub const POSITION_COLUMNS: &[&str] = &[
    COL_POS_CODE,
    COL_TITLE,
    COL_DEPT_CODE,
    COL_REPORTS_TO,
    COL_IS_MANAGER,
    COL_IS_ACTIVE,
    COL_INCUMBENTS,
];

/// Columns whose absence makes the positions sheet unusable.
pub const POSITION_REQUIRED_COLUMNS: &[&str] = &[COL_POS_CODE, COL_TITLE, COL_DEPT_CODE];

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One spreadsheet row as extracted by the file-reading adapter.
pub type RawRow = serde_json::Map<String, Value>;

/// One logical sheet of raw rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawSheet {
    /// Header names and row keys are trimmed here so that column lookups
    /// downstream can match exactly. When two keys of a row trim to the
    /// same name the first one wins.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        let mut trimmed_headers: Vec<String> = Vec::with_capacity(headers.len());
        for header in headers {
            let header = header.trim();
            if !trimmed_headers.iter().any(|h| h == header) {
                trimmed_headers.push(header.to_string());
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                let mut trimmed = RawRow::new();
                for (key, value) in row {
                    let key = key.trim();
                    if !trimmed.contains_key(key) {
                        trimmed.insert(key.to_string(), value);
                    }
                }
                trimmed
            })
            .collect();

        Self {
            name: name.into(),
            headers: trimmed_headers,
            rows,
        }
    }

    /// Build a sheet when only the rows are known, deriving the header list
    /// from the row keys in first-seen order.
    pub fn from_rows(name: impl Into<String>, rows: Vec<RawRow>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
        Self::new(name, headers, rows)
    }
}

// ---------------------------------------------------------------------------
// Typed rows
// ---------------------------------------------------------------------------

/// A reference from one row to another row's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowReference<'a> {
    pub column: &'static str,
    pub field: &'static str,
    pub target: EntityKind,
    pub key: &'a str,
}

/// A named scalar field of a row, used by the required-field checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowField<'a> {
    pub column: &'static str,
    pub field: &'static str,
    pub value: Option<&'a str>,
}

/// Behaviour shared by every importable row type.
///
/// `parent_code` is the self-referential link (department parent,
/// position reports-to) that the hierarchy checks walk.
pub trait ImportRow {
    const ENTITY: EntityKind;
    const CODE_COLUMN: &'static str;
    const PARENT_COLUMN: &'static str;

    fn code(&self) -> &str;
    fn parent_code(&self) -> Option<&str>;
    fn source_row(&self) -> usize;

    /// Fields that must be non-empty.
    fn required_fields(&self) -> Vec<RowField<'_>>;

    /// Free-form fields that must parse as JSON when present.
    fn json_fields(&self) -> Vec<RowField<'_>> {
        Vec::new()
    }

    /// Every outgoing reference to another row's code.
    fn references(&self) -> Vec<RowReference<'_>>;

    /// The body sent to the remote service for this row.
    fn to_payload(&self) -> Value;
}

/// A department as parsed from the departments sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRow {
    pub code: String,
    pub name: String,
    pub parent_code: Option<String>,
    /// Raw JSON text; parseability is checked by validation.
    pub metadata: Option<String>,
    /// 1-based data row index (first row below the header is 1).
    pub source_row: usize,
}

impl ImportRow for DepartmentRow {
    const ENTITY: EntityKind = EntityKind::Department;
    const CODE_COLUMN: &'static str = COL_DEPT_CODE;
    const PARENT_COLUMN: &'static str = COL_PARENT_DEPT_CODE;

    fn code(&self) -> &str {
        &self.code
    }

    fn parent_code(&self) -> Option<&str> {
        self.parent_code.as_deref()
    }

    fn source_row(&self) -> usize {
        self.source_row
    }

    fn required_fields(&self) -> Vec<RowField<'_>> {
        vec![
            RowField {
                column: COL_DEPT_CODE,
                field: "code",
                value: Some(&self.code),
            },
            RowField {
                column: COL_DEPT_NAME,
                field: "name",
                value: Some(&self.name),
            },
        ]
    }

    fn json_fields(&self) -> Vec<RowField<'_>> {
        vec![RowField {
            column: COL_METADATA,
            field: "metadata",
            value: self.metadata.as_deref(),
        }]
    }

    fn references(&self) -> Vec<RowReference<'_>> {
        self.parent_code
            .as_deref()
            .map(|key| RowReference {
                column: COL_PARENT_DEPT_CODE,
                field: "parent_code",
                target: EntityKind::Department,
                key,
            })
            .into_iter()
            .collect()
    }

    fn to_payload(&self) -> Value {
        json!({
            "code": self.code,
            "name": self.name,
            "parent_code": self.parent_code,
            "metadata": self.metadata,
        })
    }
}

/// A position as parsed from the positions sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    pub code: String,
    pub title: String,
    pub dept_code: String,
    pub reports_to_code: Option<String>,
    pub is_manager: bool,
    pub is_active: bool,
    pub incumbents_count: u32,
    pub source_row: usize,
}

impl ImportRow for PositionRow {
    const ENTITY: EntityKind = EntityKind::Position;
    const CODE_COLUMN: &'static str = COL_POS_CODE;
    const PARENT_COLUMN: &'static str = COL_REPORTS_TO;

    fn code(&self) -> &str {
        &self.code
    }

    fn parent_code(&self) -> Option<&str> {
        self.reports_to_code.as_deref()
    }

    fn source_row(&self) -> usize {
        self.source_row
    }

    fn required_fields(&self) -> Vec<RowField<'_>> {
        vec![
            RowField {
                column: COL_POS_CODE,
                field: "code",
                value: Some(&self.code),
            },
            RowField {
                column: COL_TITLE,
                field: "title",
                value: Some(&self.title),
            },
            RowField {
                column: COL_DEPT_CODE,
                field: "dept_code",
                value: Some(&self.dept_code),
            },
        ]
    }

    fn references(&self) -> Vec<RowReference<'_>> {
        let mut refs = Vec::with_capacity(2);
        if !self.dept_code.is_empty() {
            refs.push(RowReference {
                column: COL_DEPT_CODE,
                field: "dept_code",
                target: EntityKind::Department,
                key: &self.dept_code,
            });
        }
        if let Some(key) = self.reports_to_code.as_deref() {
            refs.push(RowReference {
                column: COL_REPORTS_TO,
                field: "reports_to_code",
                target: EntityKind::Position,
                key,
            });
        }
        refs
    }

    fn to_payload(&self) -> Value {
        json!({
            "code": self.code,
            "title": self.title,
            "dept_code": self.dept_code,
            "reports_to_code": self.reports_to_code,
            "is_manager": self.is_manager,
            "is_active": self.is_active,
            "incumbents_count": self.incumbents_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Parse results
// ---------------------------------------------------------------------------

/// Rows parsed from one sheet plus the coercion findings raised on the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet<T> {
    pub rows: Vec<T>,
    pub findings: Vec<ValidationFinding>,
}

/// Both sheets of an organization workbook after parsing.
#[derive(Debug, Clone, Default)]
pub struct ParsedWorkbook {
    pub departments: Vec<DepartmentRow>,
    pub positions: Vec<PositionRow>,
    pub findings: Vec<ValidationFinding>,
}

impl ParsedWorkbook {
    pub fn total_rows(&self) -> usize {
        self.departments.len() + self.positions.len()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the departments sheet.
///
/// Fails with [`CoreError::Structural`] when a required column is absent.
pub fn parse_departments(sheet: &RawSheet) -> Result<ParsedSheet<DepartmentRow>, CoreError> {
    let entity = EntityKind::Department;
    let findings = check_headers(
        sheet,
        entity,
        DEPARTMENT_REQUIRED_COLUMNS,
        DEPARTMENT_COLUMNS,
    )?;

    let rows = data_rows(sheet)
        .map(|(source_row, raw)| DepartmentRow {
            code: cell_text(raw, COL_DEPT_CODE).unwrap_or_default(),
            name: cell_text(raw, COL_DEPT_NAME).unwrap_or_default(),
            parent_code: cell_text(raw, COL_PARENT_DEPT_CODE),
            metadata: cell_text(raw, COL_METADATA),
            source_row,
        })
        .collect();

    Ok(ParsedSheet { rows, findings })
}

/// Parse the positions sheet.
///
/// Fails with [`CoreError::Structural`] when a required column is absent.
pub fn parse_positions(sheet: &RawSheet) -> Result<ParsedSheet<PositionRow>, CoreError> {
    let entity = EntityKind::Position;
    let mut findings = check_headers(sheet, entity, POSITION_REQUIRED_COLUMNS, POSITION_COLUMNS)?;
    let mut rows = Vec::with_capacity(sheet.rows.len());

    for (source_row, raw) in data_rows(sheet) {
        let is_manager = cell_bool(raw, COL_IS_MANAGER, false).unwrap_or_else(|bad| {
            findings.push(bool_finding(entity, source_row, COL_IS_MANAGER, bad));
            false
        });
        let is_active = cell_bool(raw, COL_IS_ACTIVE, true).unwrap_or_else(|bad| {
            findings.push(bool_finding(entity, source_row, COL_IS_ACTIVE, bad));
            true
        });
        let incumbents_count = cell_count(raw, COL_INCUMBENTS).unwrap_or_else(|bad| {
            findings.push(
                ValidationFinding::error(
                    FindingKind::InvalidValue,
                    entity,
                    source_row,
                    format!("{COL_INCUMBENTS} must be a whole number of zero or more"),
                )
                .with_column(COL_INCUMBENTS)
                .with_field(COL_INCUMBENTS)
                .with_value(bad)
                .with_suggestion("Enter a whole number such as 0, 1 or 12"),
            );
            0
        });

        rows.push(PositionRow {
            code: cell_text(raw, COL_POS_CODE).unwrap_or_default(),
            title: cell_text(raw, COL_TITLE).unwrap_or_default(),
            dept_code: cell_text(raw, COL_DEPT_CODE).unwrap_or_default(),
            reports_to_code: cell_text(raw, COL_REPORTS_TO),
            is_manager,
            is_active,
            incumbents_count,
            source_row,
        });
    }

    Ok(ParsedSheet { rows, findings })
}

/// Parse whichever sheets the workbook provides.
///
/// A workbook with neither sheet, or with no data rows at all, is a
/// structural error.
pub fn parse_workbook(
    departments: Option<&RawSheet>,
    positions: Option<&RawSheet>,
) -> Result<ParsedWorkbook, CoreError> {
    if departments.is_none() && positions.is_none() {
        return Err(CoreError::Structural(
            "Workbook must contain a Departments or Positions sheet".to_string(),
        ));
    }

    let mut workbook = ParsedWorkbook::default();

    if let Some(sheet) = departments {
        let parsed = parse_departments(sheet)?;
        workbook.departments = parsed.rows;
        workbook.findings.extend(parsed.findings);
    }
    if let Some(sheet) = positions {
        let parsed = parse_positions(sheet)?;
        workbook.positions = parsed.rows;
        workbook.findings.extend(parsed.findings);
    }

    if workbook.total_rows() == 0 {
        return Err(CoreError::Structural(
            "Workbook contains no data rows".to_string(),
        ));
    }

    Ok(workbook)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject sheets missing required columns; warn about unknown ones.
fn check_headers(
    sheet: &RawSheet,
    entity: EntityKind,
    required: &[&str],
    known: &[&str],
) -> Result<Vec<ValidationFinding>, CoreError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !sheet.headers.iter().any(|h| h.as_str() == *col))
        .collect();

    if !missing.is_empty() {
        return Err(CoreError::Structural(format!(
            "{} sheet is missing required column(s): {}",
            entity.sheet_name(),
            missing.join(", ")
        )));
    }

    Ok(sheet
        .headers
        .iter()
        .filter(|h| !known.contains(&h.as_str()))
        .map(|h| {
            ValidationFinding::warning(
                FindingKind::UnknownColumn,
                entity,
                0,
                format!("Column '{h}' is not recognised and will be ignored"),
            )
            .with_column(h.clone())
        })
        .collect())
}

/// Non-blank rows paired with their 1-based data row index.
///
/// Blank rows are skipped but still consume a row number so that reported
/// rows line up with the spreadsheet.
fn data_rows(sheet: &RawSheet) -> impl Iterator<Item = (usize, &RawRow)> {
    sheet
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !is_blank(row))
        .map(|(i, row)| (i + 1, row))
}

fn is_blank(row: &RawRow) -> bool {
    row.values().all(|v| match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

/// Read a cell as trimmed text. Empty cells become `None`.
pub fn cell_text(row: &RawRow, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Spreadsheet numbers arrive as floats; `101.0` is the code `101`.
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Read a boolean cell. `Err` carries the offending value.
fn cell_bool(row: &RawRow, column: &str, default: bool) -> Result<bool, Value> {
    let Some(value) = row.get(column) else {
        return Ok(default);
    };
    match value {
        Value::Null => Ok(default),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Ok(true),
            Some(f) if f == 0.0 => Ok(false),
            _ => Err(value.clone()),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "true" | "yes" | "y" | "1" => Ok(true),
            "false" | "no" | "n" | "0" => Ok(false),
            _ => Err(value.clone()),
        },
        _ => Err(value.clone()),
    }
}

/// Read a non-negative whole number. Empty cells count as zero.
fn cell_count(row: &RawRow, column: &str) -> Result<u32, Value> {
    let Some(value) = row.get(column) else {
        return Ok(0);
    };
    let parsed = match value {
        Value::Null => return Ok(0),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(value.clone()),
    }
}

fn bool_finding(entity: EntityKind, row: usize, column: &str, value: Value) -> ValidationFinding {
    ValidationFinding::error(
        FindingKind::InvalidValue,
        entity,
        row,
        format!("{column} must be true or false"),
    )
    .with_column(column)
    .with_field(column)
    .with_value(value)
    .with_suggestion("Use TRUE/FALSE, yes/no or 1/0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn raw(value: Value) -> RawRow {
        value.as_object().cloned().expect("test rows are objects")
    }

    fn dept_sheet(rows: Vec<Value>) -> RawSheet {
        RawSheet::new(
            "Departments",
            DEPARTMENT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(raw).collect(),
        )
    }

    fn pos_sheet(rows: Vec<Value>) -> RawSheet {
        RawSheet::new(
            "Positions",
            POSITION_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(raw).collect(),
        )
    }

    // -- parse_departments ----------------------------------------------------

    #[test]
    fn parses_department_rows_with_trimming() {
        let sheet = dept_sheet(vec![
            json!({"dept_code": " HQ ", "name": "Head Office", "parent_dept_code": ""}),
            json!({"dept_code": "ENG", "name": "Engineering", "parent_dept_code": "HQ",
                   "metadata": "{\"cost_center\": 12}"}),
        ]);
        let parsed = parse_departments(&sheet).expect("sheet is well formed");

        assert!(parsed.findings.is_empty());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].code, "HQ");
        assert_eq!(parsed.rows[0].parent_code, None);
        assert_eq!(parsed.rows[0].source_row, 1);
        assert_eq!(parsed.rows[1].parent_code.as_deref(), Some("HQ"));
        assert_eq!(
            parsed.rows[1].metadata.as_deref(),
            Some("{\"cost_center\": 12}")
        );
    }

    #[test]
    fn numeric_codes_render_without_fraction() {
        let sheet = dept_sheet(vec![json!({"dept_code": 101.0, "name": "Ops"})]);
        let parsed = parse_departments(&sheet).expect("sheet is well formed");
        assert_eq!(parsed.rows[0].code, "101");
    }

    #[test]
    fn missing_required_column_is_structural() {
        let sheet = RawSheet::new("Departments", vec!["name".to_string()], Vec::new());
        let err = parse_departments(&sheet).unwrap_err();
        assert_matches!(err, CoreError::Structural(msg) if msg.contains("dept_code"));
    }

    #[test]
    fn unknown_columns_warn_on_header_row() {
        let mut sheet = dept_sheet(vec![json!({"dept_code": "A", "name": "A"})]);
        sheet.headers.push("notes".to_string());
        let parsed = parse_departments(&sheet).expect("sheet is well formed");

        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].kind, FindingKind::UnknownColumn);
        assert_eq!(parsed.findings[0].row, 0);
        assert!(!parsed.findings[0].is_blocking());
    }

    #[test]
    fn padded_column_names_still_read_their_cells() {
        let sheet = RawSheet::from_rows(
            "Departments",
            vec![raw(json!({" dept_code ": "HQ", "name ": "Head Office"}))],
        );
        assert_eq!(sheet.headers, vec!["dept_code", "name"]);

        let parsed = parse_departments(&sheet).expect("sheet is well formed");
        assert!(parsed.findings.is_empty());
        assert_eq!(parsed.rows[0].code, "HQ");
        assert_eq!(parsed.rows[0].name, "Head Office");
    }

    #[test]
    fn blank_rows_are_skipped_but_keep_numbering() {
        let sheet = dept_sheet(vec![
            json!({"dept_code": "A", "name": "A"}),
            json!({"dept_code": "", "name": null}),
            json!({"dept_code": "B", "name": "B"}),
        ]);
        let parsed = parse_departments(&sheet).expect("sheet is well formed");
        let rows: Vec<usize> = parsed.rows.iter().map(|r| r.source_row).collect();
        assert_eq!(rows, vec![1, 3]);
    }

    // -- parse_positions ------------------------------------------------------

    #[test]
    fn parses_position_scalars() {
        let sheet = pos_sheet(vec![json!({
            "pos_code": "P1", "title": "Lead", "dept_code": "ENG",
            "reports_to_pos_code": "P0", "is_manager": "Yes",
            "is_active": 0, "incumbents_count": "3"
        })]);
        let parsed = parse_positions(&sheet).expect("sheet is well formed");
        let row = &parsed.rows[0];

        assert!(parsed.findings.is_empty());
        assert!(row.is_manager);
        assert!(!row.is_active);
        assert_eq!(row.incumbents_count, 3);
        assert_eq!(row.reports_to_code.as_deref(), Some("P0"));
    }

    #[test]
    fn empty_scalars_take_defaults() {
        let sheet = pos_sheet(vec![json!({"pos_code": "P1", "title": "Lead", "dept_code": "ENG"})]);
        let parsed = parse_positions(&sheet).expect("sheet is well formed");
        let row = &parsed.rows[0];

        assert!(!row.is_manager);
        assert!(row.is_active);
        assert_eq!(row.incumbents_count, 0);
    }

    #[test]
    fn bad_scalars_produce_findings_and_defaults() {
        let sheet = pos_sheet(vec![json!({
            "pos_code": "P1", "title": "Lead", "dept_code": "ENG",
            "is_manager": "maybe", "incumbents_count": -2
        })]);
        let parsed = parse_positions(&sheet).expect("sheet is well formed");

        assert_eq!(parsed.findings.len(), 2);
        assert!(parsed
            .findings
            .iter()
            .all(|f| f.kind == FindingKind::InvalidValue && f.row == 1));
        assert!(!parsed.rows[0].is_manager);
        assert_eq!(parsed.rows[0].incumbents_count, 0);
    }

    // -- parse_workbook -------------------------------------------------------

    #[test]
    fn workbook_without_sheets_is_structural() {
        assert_matches!(parse_workbook(None, None), Err(CoreError::Structural(_)));
    }

    #[test]
    fn workbook_without_rows_is_structural() {
        let sheet = dept_sheet(Vec::new());
        assert_matches!(
            parse_workbook(Some(&sheet), None),
            Err(CoreError::Structural(msg)) if msg.contains("no data rows")
        );
    }

    #[test]
    fn from_rows_derives_headers_in_first_seen_order() {
        let sheet = RawSheet::from_rows(
            "Departments",
            vec![
                raw(json!({"dept_code": "A", "name": "A"})),
                raw(json!({"dept_code": "B", "parent_dept_code": "A"})),
            ],
        );
        assert_eq!(sheet.headers.len(), 3);
        assert!(sheet.headers.contains(&"parent_dept_code".to_string()));
    }
}
