//! The assistant's editable workbook.
//!
//! A workbook is loaded completely into memory (values and formulas), edited with the
//! operations below and written back as `.xlsx`. Cells are addressed zero-based internally;
//! user-facing row numbers are one-based.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use calamine::{Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, XlsxError};
use thiserror::Error;

use crate::convert::CellValue;
use crate::convert::spreadsheet::write_cell;

pub mod command;

pub use command::{Command, parse_command};

/// Characters Excel does not allow in sheet names.
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    #[error("Row {row} does not exist (the sheet has {rows} rows)")]
    RowOutOfRange { row: u32, rows: u32 },

    #[error("Empty formula")]
    EmptyFormula,

    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::Error),

    #[error("failed to write workbook: {0}")]
    Write(#[from] XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A cell position, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl FromStr for CellRef {
    type Err = WorkbookError;

    /// Parse an A1 reference: 1-3 letters followed by a one-based row number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkbookError::InvalidCell(s.to_string());
        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (letters, digits) = s.split_at(split);

        if !(1..=7).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let col = column_index(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(CellRef { row: row - 1, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row + 1)
    }
}

/// Zero-based index of a column given as 1-3 letters (`A` is 0, `AA` is 26).
pub fn column_index(letters: &str) -> Option<u16> {
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let index = letters
        .chars()
        .fold(0u32, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1));
    u16::try_from(index - 1).ok()
}

pub fn column_name(index: u16) -> String {
    let mut n = u32::from(index) + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    name.iter().rev().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(CellValue),
    /// Formula text without the leading `=`
    Formula(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u16), Cell>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, cell: CellRef) -> Option<&Cell> {
        self.cells.get(&(cell.row, cell.col))
    }

    /// Number of rows in use, counted from row 1.
    pub fn row_count(&self) -> u32 {
        self.cells.keys().map(|(row, _)| row + 1).max().unwrap_or(0)
    }

    fn set(&mut self, cell: CellRef, value: Cell) {
        match value {
            Cell::Value(CellValue::Empty) => {
                self.cells.remove(&(cell.row, cell.col));
            }
            value => {
                self.cells.insert((cell.row, cell.col), value);
            }
        }
    }

    /// Text shown for a cell when combining columns.
    fn display(&self, row: u32, col: u16) -> String {
        match self.cells.get(&(row, col)) {
            Some(Cell::Value(value)) => value.to_string(),
            Some(Cell::Formula(formula)) => format!("={formula}"),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Load every sheet of an `.xlsx` or `.xls` file, including formulas.
    pub fn open(path: &Path) -> Result<Self, WorkbookError> {
        let mut source = open_workbook_auto(path)?;
        let mut sheets = Vec::new();

        for name in source.sheet_names() {
            let mut sheet = Sheet::new(&name);

            let range = source.worksheet_range(&name)?;
            if let Some((start_row, start_col)) = range.start() {
                for (row, col, data) in range.used_cells() {
                    let value = CellValue::from_data(data);
                    if let Some(cell) = absolute(start_row, start_col, row, col) {
                        sheet.set(cell, Cell::Value(value));
                    }
                }
            }

            // Formula ranges are unavailable for some legacy files
            if let Ok(formulas) = source.worksheet_formula(&name)
                && let Some((start_row, start_col)) = formulas.start()
            {
                for (row, col, formula) in formulas.used_cells() {
                    if let Some(cell) = absolute(start_row, start_col, row, col) {
                        sheet.set(cell, Cell::Formula(formula.trim_start_matches('=').to_string()));
                    }
                }
            }

            sheets.push(sheet);
        }

        Ok(Self { sheets })
    }

    /// Write the workbook as `.xlsx`. The file is written next to `path` and renamed over it, so
    /// readers never see a half-written workbook.
    pub fn save(&self, path: &Path) -> Result<(), WorkbookError> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            for (&(row, col), cell) in &sheet.cells {
                match cell {
                    Cell::Value(value) => write_cell(worksheet, row, col, value, &date_format)?,
                    Cell::Formula(formula) => {
                        worksheet.write_formula(row, col, format!("={formula}").as_str())?;
                    }
                }
            }
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = std::path::PathBuf::from(staging);

        workbook.save(&staging)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, WorkbookError> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))
    }

    fn sheet_or_create(&mut self, name: &str) -> Result<&mut Sheet, WorkbookError> {
        if let Some(index) = self.sheets.iter().position(|s| s.name == name) {
            return Ok(&mut self.sheets[index]);
        }
        validate_sheet_name(name)?;
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    /// Store `raw` in a cell. Numeric input becomes a number; the sheet is created if needed.
    pub fn set_value(&mut self, sheet: &str, cell: CellRef, raw: &str) -> Result<(), WorkbookError> {
        self.sheet_or_create(sheet)?
            .set(cell, Cell::Value(CellValue::parse_input(raw)));
        Ok(())
    }

    /// Store a formula in a cell; a leading `=` is optional.
    pub fn set_formula(&mut self, sheet: &str, cell: CellRef, formula: &str) -> Result<(), WorkbookError> {
        let formula = formula.trim().trim_start_matches('=').trim();
        if formula.is_empty() {
            return Err(WorkbookError::EmptyFormula);
        }
        self.sheet_or_create(sheet)?
            .set(cell, Cell::Formula(formula.to_string()));
        Ok(())
    }

    /// Remove a one-based row, shifting the rows below it up.
    pub fn delete_row(&mut self, sheet: &str, row: u32) -> Result<(), WorkbookError> {
        let target = self.sheet_mut(sheet)?;
        let rows = target.row_count();
        if row == 0 || row > rows {
            return Err(WorkbookError::RowOutOfRange { row, rows });
        }
        let removed = row - 1;

        target.cells = std::mem::take(&mut target.cells)
            .into_iter()
            .filter(|((r, _), _)| *r != removed)
            .map(|((r, c), cell)| if r > removed { ((r - 1, c), cell) } else { ((r, c), cell) })
            .collect();
        Ok(())
    }

    /// Join two columns row by row with a space into `destination`, skipping empty parts. Rows
    /// where both parts are empty leave `destination` blank.
    pub fn combine_columns(&mut self, sheet: &str, first: u16, second: u16, destination: u16) -> Result<(), WorkbookError> {
        let target = self.sheet_mut(sheet)?;
        for row in 0..target.row_count() {
            let parts = [target.display(row, first), target.display(row, second)];
            let joined = parts
                .iter()
                .filter(|p| !p.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            let value = if joined.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(joined)
            };
            target.set(CellRef { row, col: destination }, Cell::Value(value));
        }
        Ok(())
    }
}

fn absolute(start_row: u32, start_col: u32, row: usize, col: usize) -> Option<CellRef> {
    let row = start_row.checked_add(u32::try_from(row).ok()?)?;
    let col = u16::try_from(start_col.checked_add(u32::try_from(col).ok()?)?).ok()?;
    Some(CellRef { row, col })
}

fn validate_sheet_name(name: &str) -> Result<(), WorkbookError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || name.chars().count() > 31
        || name.contains(INVALID_SHEET_CHARS)
        || name.starts_with('\'')
        || name.ends_with('\'')
    {
        return Err(WorkbookError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
