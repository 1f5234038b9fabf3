//! Render the first sheet of a spreadsheet as a Word document table.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::NaiveDateTime;
use docx_rs::{Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ConvertError;
use super::spreadsheet::read_first_sheet;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct WordExportOptions {
    /// Title plus source file name and conversion time
    pub include_header: bool,
    /// Row and column counts
    pub include_stats: bool,
    /// Word table style name
    pub table_style: String,
}

impl Default for WordExportOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            include_stats: true,
            table_style: "Light Grid Accent 1".to_string(),
        }
    }
}

pub fn excel_to_word(
    input: &Path,
    output: &Path,
    options: &WordExportOptions,
    now: NaiveDateTime,
) -> Result<(), ConvertError> {
    let table = read_first_sheet(input)?;
    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut docx = Docx::new()
        .add_style(Style::new("Title", StyleType::Paragraph).name("Title").size(56).bold())
        .add_style(Style::new("Heading2", StyleType::Paragraph).name("Heading 2").size(26).bold());

    if options.include_header {
        docx = docx
            .add_paragraph(styled("Excel Data", "Title"))
            .add_paragraph(plain(format!("File: {source_name}")))
            .add_paragraph(plain(format!("Converted: {}", now.format("%Y-%m-%d %H:%M"))));
    }

    if options.include_stats {
        docx = docx
            .add_paragraph(styled("Statistics", "Heading2"))
            .add_paragraph(plain(format!("Total rows: {}", table.rows.len())))
            .add_paragraph(plain(format!("Total columns: {}", table.column_count())))
            .add_paragraph(Paragraph::new());
    }

    docx = docx.add_paragraph(styled("Data", "Heading2"));

    // Word rejects tables without cells
    if table.column_count() > 0 {
        let header = TableRow::new(
            table
                .header
                .iter()
                .map(|name| TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(name).bold())))
                .collect(),
        );
        let body = table.rows.iter().map(|row| {
            TableRow::new(
                row.iter()
                    .map(|value| TableCell::new().add_paragraph(plain(value.to_string())))
                    .collect(),
            )
        });

        let rows = std::iter::once(header).chain(body).collect();
        docx = docx.add_table(Table::new(rows).style(&style_id(&options.table_style)));
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ConvertError::Docx(e.to_string()))?;
    fs::write(output, buffer.into_inner())?;
    Ok(())
}

fn plain(text: impl Into<String>) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn styled(text: &str, style: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text)).style(style)
}

/// Word stores built-in table styles under their name without spaces.
fn style_id(name: &str) -> String {
    name.split_whitespace().collect()
}
