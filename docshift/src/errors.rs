use crate::convert::ConvertError;
use crate::workbook::WorkbookError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data: missing file, bad action, disallowed extension
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested file does not exist
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// Path resolves outside of the directory it was meant for
    #[error("{message}")]
    Forbidden { message: String },

    /// Upload exceeds the configured size cap
    #[error("File exceeds the maximum upload size of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A conversion or inspection failed
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// An edit of the assistant's workbook failed
    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    /// Filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            resource: "File".to_string(),
            id: id.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Conversion(e) => match e {
                ConvertError::InvalidOptions(_) | ConvertError::WrongSource { .. } => StatusCode::BAD_REQUEST,
                ConvertError::NothingToWrite => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Workbook(e) => match e {
                WorkbookError::Read(_) | WorkbookError::Write(_) | WorkbookError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Error::Io(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body.
    ///
    /// Conversion and filesystem failures carry their raw text so the frontend can show what went wrong.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::Conversion(e) => format!("Conversion failed: {e}"),
            Error::Io(e) => format!("File operation failed: {e}"),
            Error::Other(e) => format!("Internal server error: {e}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Io(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Conversion(_) | Error::Workbook(_) => {
                tracing::warn!("Document error: {}", self);
            }
            Error::Forbidden { .. } => {
                tracing::info!("Rejected path: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
