use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssistantHealth {
    pub status: String,
    pub assistant: String,
    pub version: String,
    pub timestamp: String,
}

/// Reply to a workbook upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssistantReply {
    pub ok: bool,
    pub reply: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
    /// Set when the command changed the workbook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_available: Option<bool>,
}

impl ChatResponse {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            download_available: None,
        }
    }

    pub fn changed(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            download_available: Some(true),
        }
    }
}

/// The active workbook, or its absence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum WorkbookStatus {
    Active {
        active: bool,
        path: String,
        size: u64,
        size_human: String,
        sheets: Vec<String>,
        sheet_count: usize,
        /// RFC 3339 modification time
        mtime: String,
    },
    Inactive {
        active: bool,
        message: String,
    },
}
