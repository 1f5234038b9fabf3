//! HTTP request handlers for all API endpoints.
//!
//! Handlers validate the request, resolve client-supplied names against the storage
//! directories, run conversions on the blocking pool and serialize the response.
//!
//! # Handler Modules
//!
//! - [`assistant`]: workbook assistant upload, chat, status and download
//! - [`cleanup`]: manual removal of stale files
//! - [`files`]: upload with inspection, download and file information
//! - [`health`]: service liveness
//! - [`process`]: running a conversion
//! - [`share`]: share-by-email links
//! - [`static_assets`]: frontend asset serving and SPA routing
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to an HTTP status code and a
//! `{"error": "..."}` body. The assistant endpoints answer with their own `reply` bodies.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::errors::{Error, Result};

pub mod assistant;
pub mod cleanup;
pub mod files;
pub mod health;
pub mod process;
pub mod share;
pub mod static_assets;

/// A file received through a multipart form.
#[derive(Debug)]
pub(crate) struct UploadedFile {
    /// Name as sent by the client, unsanitized
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read the `file` field of a multipart form into memory, failing as soon as it grows past
/// `max_size`. Other fields are skipped.
pub(crate) async fn read_file_field(multipart: &mut Multipart, max_size: usize) -> Result<Option<UploadedFile>> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, max_size))? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut bytes = Vec::new();

        // Check size limit incrementally to fail fast
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_size))? {
            if bytes.len() + chunk.len() > max_size {
                tracing::warn!(filename = %filename, max_size, "File size limit exceeded, aborting upload");
                return Err(Error::PayloadTooLarge { limit: max_size });
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(filename = %filename, size = bytes.len(), "Received file");
        return Ok(Some(UploadedFile { filename, bytes }));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError, max_size: usize) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit: max_size }
    } else {
        Error::bad_request(format!("Failed to parse multipart data: {e}"))
    }
}

/// Run blocking work (library conversions, workbook edits) on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("Background task failed: {e}")))
}
