//! Reading spreadsheets with calamine and writing cells with rust_xlsxwriter.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ConvertError;

/// A single cell value, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl CellValue {
    pub fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) if s.is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) if dt.is_datetime() => excel_serial_to_datetime(dt.as_f64())
                .map(CellValue::DateTime)
                .unwrap_or(CellValue::Float(dt.as_f64())),
            Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
        }
    }

    /// Parse user input the way a spreadsheet would: finite numbers become numbers, anything
    /// else stays text.
    pub fn parse_input(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => CellValue::Int(n as i64),
            Ok(n) if n.is_finite() => CellValue::Float(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Empty => serde_json::Value::Null,
            CellValue::Text(s) | CellValue::Error(s) => serde_json::Value::String(s.clone()),
            CellValue::Int(i) => serde_json::Value::from(*i),
            CellValue::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => serde_json::Value::from(*x as i64),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::DateTime(dt) => serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{i}"),
            // integral floats print without the trailing ".0"
            CellValue::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Convert a 1900-system Excel serial date into a timestamp.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis as i64))
}

/// The first worksheet as a header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table from the used area of a sheet. The first row is the header; blank header
    /// cells are named `Unnamed: <index>`, repeated names get a `.1`, `.2`, ... suffix and
    /// trailing blank rows are dropped.
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range.rows().map(|row| row.iter().map(CellValue::from_data).collect::<Vec<_>>());

        let Some(first) = rows.next() else {
            return Table::default();
        };

        let header = unique_names(first.iter().enumerate().map(|(i, cell)| match cell {
            CellValue::Empty => format!("Unnamed: {i}"),
            other => other.to_string(),
        }));

        let mut body: Vec<Vec<CellValue>> = rows
            .map(|mut row| {
                row.resize(header.len(), CellValue::Empty);
                row
            })
            .collect();

        while body.last().is_some_and(|row| row.iter().all(CellValue::is_empty)) {
            body.pop();
        }

        Table { header, rows: body }
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }
}

/// Suffix repeated column names so every name is distinct: `Name`, `Name.1`, `Name.2`.
fn unique_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();

    for name in names {
        let mut candidate = name.clone();
        if taken.contains(&candidate) {
            let count = seen.entry(name.clone()).or_insert(0);
            loop {
                *count += 1;
                candidate = format!("{name}.{count}");
                if !taken.contains(&candidate) {
                    break;
                }
            }
        }
        taken.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

/// Read the first worksheet of an xlsx or xls file.
pub fn read_first_sheet(path: &Path) -> Result<Table, ConvertError> {
    let mut workbook = open_workbook_auto(path)?;
    let first = workbook.sheet_names().into_iter().next().ok_or(ConvertError::NoSheets)?;
    let range = workbook.worksheet_range(&first)?;
    Ok(Table::from_range(&range))
}

/// Structure summary reported for uploaded spreadsheets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SpreadsheetInfo {
    /// Data rows in the first sheet, header excluded
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub sheets: Vec<String>,
    pub sheet_count: usize,
    pub has_formulas: bool,
}

pub fn inspect_spreadsheet(path: &Path) -> Result<SpreadsheetInfo, ConvertError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheets = workbook.sheet_names();

    let table = match sheets.first() {
        Some(first) => Table::from_range(&workbook.worksheet_range(first)?),
        None => Table::default(),
    };

    // Formula ranges are unavailable for some legacy files; treat those as formula-free
    let has_formulas = sheets.iter().any(|name| {
        workbook
            .worksheet_formula(name)
            .is_ok_and(|formulas| formulas.used_cells().any(|(_, _, f)| !f.is_empty()))
    });

    Ok(SpreadsheetInfo {
        rows: table.rows.len(),
        columns: table.column_count(),
        column_names: table.header,
        sheet_count: sheets.len(),
        sheets,
        has_formulas,
    })
}

/// Write one cell. Empty cells are skipped.
pub(crate) fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    date_format: &Format,
) -> Result<(), XlsxError> {
    match value {
        CellValue::Empty => {}
        CellValue::Text(s) | CellValue::Error(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::DateTime(dt) => {
            worksheet.write_datetime_with_format(row, col, dt, date_format)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{WorkbookFixture, write_workbook};
    use tempfile::TempDir;

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Float(3.0).to_string(), "3");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Int(-7).to_string(), "-7");
        assert_eq!(CellValue::Empty.to_string(), "");
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(CellValue::DateTime(dt).to_string(), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(CellValue::parse_input("42"), CellValue::Int(42));
        assert_eq!(CellValue::parse_input(" 1.5 "), CellValue::Float(1.5));
        assert_eq!(CellValue::parse_input("1e3"), CellValue::Int(1000));
        assert_eq!(CellValue::parse_input("hello"), CellValue::Text("hello".into()));
        assert_eq!(CellValue::parse_input("inf"), CellValue::Text("inf".into()));
        assert_eq!(CellValue::parse_input(""), CellValue::Empty);
    }

    #[test]
    fn test_excel_serial_to_datetime() {
        let dt = excel_serial_to_datetime(45292.5).unwrap();
        assert_eq!(dt.to_string(), "2024-01-01 12:00:00");
    }

    #[test]
    fn test_table_from_range() {
        let mut range = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("Name".into()));
        range.set_value((0, 2), Data::String("Score".into()));
        range.set_value((1, 0), Data::String("Ana".into()));
        range.set_value((1, 2), Data::Float(9.5));

        let table = Table::from_range(&range);

        assert_eq!(table.header, vec!["Name", "Unnamed: 1", "Score"]);
        // rows 2 and 3 are blank and trimmed
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], CellValue::Text("Ana".into()));
        assert_eq!(table.rows[0][1], CellValue::Empty);
        assert_eq!(table.rows[0][2], CellValue::Float(9.5));
    }

    #[test]
    fn test_repeated_header_names_are_suffixed() {
        let mut range = Range::new((0, 0), (1, 4));
        for (col, name) in ["Name", "Name", "Name.1", "Name", "Score"].into_iter().enumerate() {
            range.set_value((0, col as u32), Data::String(name.into()));
        }

        let table = Table::from_range(&range);

        assert_eq!(table.header, vec!["Name", "Name.1", "Name.1.1", "Name.2", "Score"]);
    }

    #[test]
    fn test_read_first_sheet_and_inspect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.xlsx");
        write_workbook(
            &path,
            &WorkbookFixture::new("Sales")
                .row(&["Region", "Units"])
                .row(&["North", "10"])
                .row(&["South", "12"])
                .row(&["Total"])
                .formula(3, 1, "=SUM(B2:B3)")
                .sheet("Notes"),
        );

        let table = read_first_sheet(&path).unwrap();
        assert_eq!(table.header, vec!["Region", "Units"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("North".into()), CellValue::Float(10.0)]);

        let info = inspect_spreadsheet(&path).unwrap();
        assert_eq!(info.columns, 2);
        assert_eq!(info.rows, 3);
        assert_eq!(info.sheets, vec!["Sales", "Notes"]);
        assert_eq!(info.sheet_count, 2);
        assert!(info.has_formulas);
    }

    #[test]
    fn test_inspect_without_formulas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.xlsx");
        write_workbook(&path, &WorkbookFixture::new("Sheet1").row(&["A"]).row(&["1"]));

        let info = inspect_spreadsheet(&path).unwrap();
        assert!(!info.has_formulas);
        assert_eq!(info.rows, 1);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(read_first_sheet(&path).is_err());
    }
}
