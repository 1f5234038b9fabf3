//! Document conversions and inspection.
//!
//! Everything in here is synchronous and touches the filesystem; request handlers call it
//! through `tokio::task::spawn_blocking`.
//!
//! | Action          | Source      | Output  |
//! |-----------------|-------------|---------|
//! | `excel_to_word` | xlsx, xls   | `.docx` |
//! | `word_to_excel` | docx        | `.xlsx` |
//! | `excel_to_csv`  | xlsx, xls   | `.csv`  |
//! | `excel_to_json` | xlsx, xls   | `.json` |

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod document;
pub mod export;
pub mod spreadsheet;
pub mod to_excel;
pub mod to_word;

pub use document::{DocumentInfo, WordDocument, inspect_document};
pub use spreadsheet::{CellValue, SpreadsheetInfo, Table, inspect_spreadsheet};
pub use to_excel::SpreadsheetExportOptions;
pub use to_word::WordExportOptions;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("invalid document archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid document XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to write document: {0}")]
    Docx(String),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("document is missing {0}")]
    MissingPart(&'static str),

    #[error("workbook has no worksheets")]
    NoSheets,

    #[error("the document has no tables, text or headings to extract")]
    NothingToWrite,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("{action} expects {expected} input, got a {actual} file")]
    WrongSource {
        action: Action,
        expected: DocumentKind,
        actual: String,
    },
}

/// Broad family of an uploaded file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// `.xlsx` and `.xls`
    Excel,
    /// `.docx`
    Word,
    Pdf,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" => Some(DocumentKind::Excel),
            "docx" => Some(DocumentKind::Word),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }

    /// Conversions offered to the client for this kind of file.
    pub fn available_conversions(self) -> Vec<String> {
        let targets: &[&str] = match self {
            DocumentKind::Excel => &["word", "csv", "json"],
            DocumentKind::Word => &["excel"],
            DocumentKind::Pdf => &[],
        };
        targets.iter().map(|t| t.to_string()).collect()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Excel => "excel",
            DocumentKind::Word => "word",
            DocumentKind::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ExcelToWord,
    WordToExcel,
    ExcelToCsv,
    ExcelToJson,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ExcelToWord => "excel_to_word",
            Action::WordToExcel => "word_to_excel",
            Action::ExcelToCsv => "excel_to_csv",
            Action::ExcelToJson => "excel_to_json",
        }
    }

    /// Extension of the produced file, without the dot.
    pub fn output_extension(self) -> &'static str {
        match self {
            Action::ExcelToWord => "docx",
            Action::WordToExcel => "xlsx",
            Action::ExcelToCsv => "csv",
            Action::ExcelToJson => "json",
        }
    }

    pub fn source_kind(self) -> DocumentKind {
        match self {
            Action::WordToExcel => DocumentKind::Word,
            Action::ExcelToWord | Action::ExcelToCsv | Action::ExcelToJson => DocumentKind::Excel,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excel_to_word" => Ok(Action::ExcelToWord),
            "word_to_excel" => Ok(Action::WordToExcel),
            "excel_to_csv" => Ok(Action::ExcelToCsv),
            "excel_to_json" => Ok(Action::ExcelToJson),
            other => Err(format!("Action not implemented: {other}")),
        }
    }
}

/// Inspection results attached to file info.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    Spreadsheet(SpreadsheetInfo),
    Document(DocumentInfo),
    /// Nothing to inspect (PDF)
    None,
}

/// Inspect a stored file according to its kind.
pub fn inspect(path: &Path, kind: DocumentKind) -> Result<Inspection, ConvertError> {
    match kind {
        DocumentKind::Excel => Ok(Inspection::Spreadsheet(inspect_spreadsheet(path)?)),
        DocumentKind::Word => Ok(Inspection::Document(inspect_document(path)?)),
        DocumentKind::Pdf => Ok(Inspection::None),
    }
}

/// Run `action` on `input`, writing the result to `output`.
///
/// `options` is the raw JSON object from the request; `null` selects the defaults. The source
/// file's extension must match the action.
pub fn run(
    action: Action,
    input: &Path,
    output: &Path,
    options: &serde_json::Value,
    now: NaiveDateTime,
) -> Result<(), ConvertError> {
    let actual = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if DocumentKind::from_extension(&actual) != Some(action.source_kind()) {
        return Err(ConvertError::WrongSource {
            action,
            expected: action.source_kind(),
            actual,
        });
    }

    match action {
        Action::ExcelToWord => to_word::excel_to_word(input, output, &parse_options(options)?, now),
        Action::WordToExcel => to_excel::word_to_excel(input, output, &parse_options(options)?, now),
        Action::ExcelToCsv => export::excel_to_csv(input, output),
        Action::ExcelToJson => export::excel_to_json(input, output),
    }
}

fn parse_options<T>(options: &serde_json::Value) -> Result<T, ConvertError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone()).map_err(|e| ConvertError::InvalidOptions(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{WorkbookFixture, write_workbook};
    use chrono::Local;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_action_parsing() {
        assert_eq!("excel_to_csv".parse::<Action>(), Ok(Action::ExcelToCsv));
        assert_eq!(
            "pdf_to_word".parse::<Action>(),
            Err("Action not implemented: pdf_to_word".to_string())
        );
        assert_eq!(Action::WordToExcel.output_extension(), "xlsx");
        assert_eq!(Action::ExcelToJson.source_kind(), DocumentKind::Excel);
    }

    #[test]
    fn test_document_kinds() {
        assert_eq!(DocumentKind::from_extension("XLS"), Some(DocumentKind::Excel));
        assert_eq!(DocumentKind::from_extension("docx"), Some(DocumentKind::Word));
        assert_eq!(DocumentKind::from_extension("txt"), None);
        assert_eq!(DocumentKind::Excel.available_conversions(), vec!["word", "csv", "json"]);
        assert!(DocumentKind::Pdf.available_conversions().is_empty());
        assert_eq!(serde_json::to_value(DocumentKind::Word).unwrap(), json!("word"));
    }

    #[test]
    fn test_run_rejects_mismatched_source() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("table.xlsx");
        write_workbook(&input, &WorkbookFixture::new("Sheet1").row(&["a"]));

        let err = run(
            Action::WordToExcel,
            &input,
            &dir.path().join("out.xlsx"),
            &json!(null),
            Local::now().naive_local(),
        )
        .unwrap_err();

        assert!(matches!(err, ConvertError::WrongSource { .. }));
        assert_eq!(err.to_string(), "word_to_excel expects word input, got a xlsx file");
    }

    #[test]
    fn test_run_rejects_bad_options() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("table.xlsx");
        write_workbook(&input, &WorkbookFixture::new("Sheet1").row(&["a"]));

        let err = run(
            Action::ExcelToWord,
            &input,
            &dir.path().join("out.docx"),
            &json!({ "include_header": "yes please" }),
            Local::now().naive_local(),
        )
        .unwrap_err();

        assert!(matches!(err, ConvertError::InvalidOptions(_)));
    }

    #[test]
    fn test_run_dispatches_csv() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("table.xlsx");
        let output = dir.path().join("table.csv");
        write_workbook(&input, &WorkbookFixture::new("Sheet1").row(&["a", "b"]).row(&["1", "2"]));

        run(Action::ExcelToCsv, &input, &output, &json!({}), Local::now().naive_local()).unwrap();

        assert!(output.exists());
    }

    #[test]
    fn test_inspect_pdf_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert_eq!(inspect(&path, DocumentKind::Pdf).unwrap(), Inspection::None);
    }
}
