//! Extract tables, text and outline from a Word document into spreadsheet sheets.

use std::path::Path;

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::ConvertError;
use super::document::WordDocument;
use super::spreadsheet::{CellValue, write_cell};

/// Excel caps sheet names at 31 characters.
const SHEET_NAME_LIMIT: usize = 31;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct SpreadsheetExportOptions {
    /// One `Table_<n>` sheet per document table
    #[serde(alias = "extraer_tablas")]
    pub extract_tables: bool,
    /// A `Text` sheet with every non-blank paragraph
    #[serde(alias = "extraer_texto")]
    pub extract_text: bool,
    /// An `Outline` sheet with the heading paragraphs
    #[serde(alias = "extraer_titulos")]
    pub extract_headings: bool,
    /// A `Metadata` sheet describing the source document
    #[serde(alias = "incluir_metadata")]
    pub include_metadata: bool,
}

impl Default for SpreadsheetExportOptions {
    fn default() -> Self {
        Self {
            extract_tables: true,
            extract_text: true,
            extract_headings: true,
            include_metadata: false,
        }
    }
}

/// A sheet about to be written: header row plus data rows.
struct SheetData {
    name: String,
    header: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

pub fn word_to_excel(
    input: &Path,
    output: &Path,
    options: &SpreadsheetExportOptions,
    now: NaiveDateTime,
) -> Result<(), ConvertError> {
    let doc = WordDocument::open(input)?;
    let sheets = collect_sheets(&doc, input, options, now);

    if sheets.is_empty() {
        return Err(ConvertError::NothingToWrite);
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for sheet in &sheets {
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "Writing sheet");
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, name) in sheet.header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &bold)?;
        }
        for (row_index, row) in sheet.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                write_cell(worksheet, row_index as u32 + 1, col as u16, value, &date_format)?;
            }
        }
    }

    workbook.save(output)?;
    Ok(())
}

fn collect_sheets(doc: &WordDocument, input: &Path, options: &SpreadsheetExportOptions, now: NaiveDateTime) -> Vec<SheetData> {
    let mut sheets = Vec::new();

    if options.extract_tables {
        for (index, rows) in doc.tables.iter().enumerate() {
            let Some((first, rest)) = rows.split_first() else {
                continue;
            };
            // a lone row is data under numeric column names
            let (header, body): (Vec<String>, &[Vec<String>]) = if rest.is_empty() {
                ((0..first.len()).map(|i| i.to_string()).collect(), rows.as_slice())
            } else {
                (first.clone(), rest)
            };
            let rows = body
                .iter()
                .map(|row| {
                    let mut cells: Vec<CellValue> = row.iter().map(|text| text_cell(text)).collect();
                    cells.resize(header.len(), CellValue::Empty);
                    cells
                })
                .collect();
            sheets.push(SheetData {
                name: sheet_name(&format!("Table_{}", index + 1)),
                header,
                rows,
            });
        }
    }

    if options.extract_text {
        let lines: Vec<Vec<CellValue>> = doc
            .paragraphs
            .iter()
            .filter(|p| !p.text.trim().is_empty())
            .enumerate()
            .map(|(i, p)| vec![CellValue::Int(i as i64 + 1), CellValue::Text(p.text.clone())])
            .collect();
        if !lines.is_empty() {
            sheets.push(SheetData {
                name: "Text".to_string(),
                header: vec!["Line".to_string(), "Content".to_string()],
                rows: lines,
            });
        }
    }

    if options.extract_headings {
        let headings: Vec<Vec<CellValue>> = doc
            .paragraphs
            .iter()
            .filter_map(|p| p.heading_level().map(|level| vec![text_cell(&level), text_cell(&p.text)]))
            .collect();
        if !headings.is_empty() {
            sheets.push(SheetData {
                name: "Outline".to_string(),
                header: vec!["Level".to_string(), "Title".to_string()],
                rows: headings,
            });
        }
    }

    if options.include_metadata {
        let source = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let info = doc.info();
        let entries = [
            ("Source file", CellValue::Text(source)),
            ("Converted", CellValue::Text(now.format("%Y-%m-%d %H:%M").to_string())),
            ("Paragraphs", CellValue::Int(info.paragraphs as i64)),
            ("Tables", CellValue::Int(info.tables as i64)),
            ("Sections", CellValue::Int(info.sections as i64)),
        ];
        sheets.push(SheetData {
            name: "Metadata".to_string(),
            header: vec!["Property".to_string(), "Value".to_string()],
            rows: entries
                .into_iter()
                .map(|(property, value)| vec![CellValue::Text(property.to_string()), value])
                .collect(),
        });
    }

    sheets
}

fn text_cell(text: &str) -> CellValue {
    if text.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(text.to_string())
    }
}

fn sheet_name(name: &str) -> String {
    name.chars().take(SHEET_NAME_LIMIT).collect()
}
