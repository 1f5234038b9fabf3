use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::share::ShareLinks;
use crate::storage::FileMetadata;

/// Request to convert an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessRequest {
    /// `filepath` from the upload response; must point into the upload directory
    #[serde(default)]
    pub filepath: String,
    /// One of `excel_to_word`, `word_to_excel`, `excel_to_csv`, `excel_to_json`
    #[serde(default)]
    pub action: String,
    /// Action-specific options, see `WordExportOptions` and `SpreadsheetExportOptions`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessOutput {
    pub filename: String,
    /// Server-side path of the generated file
    pub path: String,
    pub metadata: FileMetadata,
    /// Relative URL the file can be downloaded from
    pub download_url: String,
    pub share_links: ShareLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub output: ProcessOutput,
}
