use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::convert::{DocumentInfo, DocumentKind, Inspection, SpreadsheetInfo};
use crate::share::ShareLinks;
use crate::storage::FileMetadata;

/// Everything known about a freshly uploaded file.
///
/// Filesystem metadata and the inspection results are flattened into one object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileInfo {
    #[serde(flatten)]
    pub metadata: FileMetadata,
    /// Present for spreadsheets
    #[serde(flatten)]
    pub spreadsheet: Option<SpreadsheetInfo>,
    /// Present for Word documents
    #[serde(flatten)]
    pub document: Option<DocumentInfo>,
    /// Why the file could not be inspected, if it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    /// Conversion targets offered for this file, e.g. `["word", "csv", "json"]`
    pub available_conversions: Vec<String>,
    /// Name the file was stored under
    pub unique_filename: String,
    /// Server-side path to pass back to `/api/process`
    pub filepath: String,
}

impl UploadedFileInfo {
    pub fn new(metadata: FileMetadata, kind: DocumentKind, inspection: Result<Inspection, String>, filepath: String) -> Self {
        let (spreadsheet, document, error) = match inspection {
            Ok(Inspection::Spreadsheet(info)) => (Some(info), None, None),
            Ok(Inspection::Document(info)) => (None, Some(info), None),
            Ok(Inspection::None) => (None, None, None),
            Err(e) => (None, None, Some(e)),
        };
        Self {
            unique_filename: metadata.filename.clone(),
            metadata,
            spreadsheet,
            document,
            error,
            kind,
            available_conversions: kind.available_conversions(),
            filepath,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file_info: UploadedFileInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileInfoResponse {
    pub success: bool,
    pub file: FileMetadata,
    pub share_links: ShareLinks,
}
