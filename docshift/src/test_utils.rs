//! Test utilities: document fixtures and a fully wired test application.

use std::io::Cursor;
use std::path::Path;

use axum_test::TestServer;
use docx_rs::{Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow};
use tempfile::TempDir;

use crate::config::{Config, JanitorConfig, StorageConfig};
use crate::convert::CellValue;

enum FixtureCell {
    Value(CellValue),
    Formula(String),
}

struct FixtureSheet {
    name: String,
    cells: Vec<(u32, u16, FixtureCell)>,
    next_row: u32,
}

/// Builder for small `.xlsx` files. Coordinates are zero-based.
pub struct WorkbookFixture {
    sheets: Vec<FixtureSheet>,
}

impl WorkbookFixture {
    pub fn new(sheet: &str) -> Self {
        Self { sheets: Vec::new() }.sheet(sheet)
    }

    /// Start a new sheet; later calls write into it.
    pub fn sheet(mut self, name: &str) -> Self {
        self.sheets.push(FixtureSheet {
            name: name.to_string(),
            cells: Vec::new(),
            next_row: 0,
        });
        self
    }

    /// Append a row to the current sheet. Numeric strings are written as numbers, empty strings skipped.
    pub fn row(mut self, values: &[&str]) -> Self {
        let sheet = self.current();
        let row = sheet.next_row;
        for (col, value) in values.iter().enumerate() {
            sheet
                .cells
                .push((row, col as u16, FixtureCell::Value(CellValue::parse_input(value))));
        }
        sheet.next_row += 1;
        self
    }

    pub fn cell(self, row: u32, col: u16, value: &str) -> Self {
        self.value(row, col, CellValue::parse_input(value))
    }

    /// Place a typed value, e.g. a date or boolean.
    pub fn value(mut self, row: u32, col: u16, value: CellValue) -> Self {
        let sheet = self.current();
        sheet.cells.push((row, col, FixtureCell::Value(value)));
        sheet.next_row = sheet.next_row.max(row + 1);
        self
    }

    pub fn formula(mut self, row: u32, col: u16, formula: &str) -> Self {
        let sheet = self.current();
        sheet.cells.push((row, col, FixtureCell::Formula(formula.to_string())));
        sheet.next_row = sheet.next_row.max(row + 1);
        self
    }

    fn current(&mut self) -> &mut FixtureSheet {
        self.sheets.last_mut().expect("fixture always has a sheet")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let date_format = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name).unwrap();
            for (row, col, cell) in &sheet.cells {
                match cell {
                    FixtureCell::Value(CellValue::Empty) => {}
                    FixtureCell::Value(CellValue::Float(f)) => {
                        worksheet.write_number(*row, *col, *f).unwrap();
                    }
                    FixtureCell::Value(CellValue::Int(i)) => {
                        worksheet.write_number(*row, *col, *i as f64).unwrap();
                    }
                    FixtureCell::Value(CellValue::Bool(b)) => {
                        worksheet.write_boolean(*row, *col, *b).unwrap();
                    }
                    FixtureCell::Value(CellValue::DateTime(dt)) => {
                        worksheet.write_datetime_with_format(*row, *col, dt, &date_format).unwrap();
                    }
                    FixtureCell::Value(other) => {
                        worksheet.write_string(*row, *col, other.to_string()).unwrap();
                    }
                    FixtureCell::Formula(formula) => {
                        worksheet.write_formula(*row, *col, formula.as_str()).unwrap();
                    }
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }
}

pub fn write_workbook(path: &Path, fixture: &WorkbookFixture) {
    std::fs::write(path, fixture.to_bytes()).unwrap();
}

/// Builder for small `.docx` files with headings, paragraphs and tables.
pub struct DocumentFixture {
    docx: Docx,
}

impl DocumentFixture {
    pub fn new() -> Self {
        let docx = (1..=3).fold(Docx::new(), |docx, level| {
            docx.add_style(Style::new(format!("Heading{level}"), StyleType::Paragraph).name(format!("Heading {level}")))
        });
        Self { docx }
    }

    pub fn heading(self, level: u8, text: &str) -> Self {
        let paragraph = Paragraph::new()
            .add_run(Run::new().add_text(text))
            .style(&format!("Heading{level}"));
        Self {
            docx: self.docx.add_paragraph(paragraph),
        }
    }

    pub fn paragraph(self, text: &str) -> Self {
        Self {
            docx: self.docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text))),
        }
    }

    pub fn table(self, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                TableRow::new(
                    row.iter()
                        .map(|text| TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text))))
                        .collect(),
                )
            })
            .collect();
        Self {
            docx: self.docx.add_table(Table::new(rows)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        self.docx.clone().build().pack(&mut buffer).unwrap();
        buffer.into_inner()
    }
}

pub fn write_document(path: &Path, fixture: &DocumentFixture) {
    std::fs::write(path, fixture.to_bytes()).unwrap();
}

/// Configuration pointing every directory into `root`, with the janitor disabled.
pub fn create_test_config(root: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://docs.test".parse().unwrap(),
        storage: StorageConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
            data_dir: root.join("data"),
        },
        janitor: JanitorConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A running test server over temporary storage. Keep the `TempDir` alive for the test's duration.
pub struct TestApp {
    pub server: TestServer,
    pub config: Config,
    pub dir: TempDir,
    pub bg_services: crate::BackgroundServices,
}

pub async fn create_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    create_test_app_with(create_test_config(dir.path()), dir).await
}

pub async fn create_test_app_with(config: Config, dir: TempDir) -> TestApp {
    let app = crate::Application::new(config.clone())
        .await
        .expect("Failed to create application");
    let (server, bg_services) = app.into_test_server();
    TestApp {
        server,
        config,
        dir,
        bg_services,
    }
}
