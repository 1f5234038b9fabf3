//! HTTP handlers for uploading, downloading and describing files.

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::{
        handlers::{read_file_field, run_blocking},
        models::files::{FileInfoResponse, UploadResponse, UploadedFileInfo},
    },
    convert::{self, DocumentKind},
    errors::{Error, Result},
    share::share_links,
    storage::{self, file_metadata, sanitize_filename},
};

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "files",
    summary = "Upload file",
    description = "Upload a spreadsheet (`.xlsx`, `.xls`), Word document (`.docx`) or PDF. The file is stored under a sanitized name, \
inspected, and described together with the conversions it supports.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form with a `file` field"
    ),
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "No file, empty name or file type not allowed"),
        (status = 413, description = "File exceeds the configured size limit"),
        (status = 500, description = "Internal server error")
    )
)]
#[instrument(skip_all)]
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>> {
    let upload = read_file_field(&mut multipart, state.config.max_upload_size)
        .await?
        .ok_or_else(|| Error::bad_request("No file provided"))?;

    if upload.filename.trim().is_empty() {
        return Err(Error::bad_request("Empty filename"));
    }
    if !storage::is_allowed(&upload.filename) {
        return Err(Error::bad_request("File type not allowed"));
    }

    // Sanitizing can strip everything but the extension, so the kind is derived afterwards
    let filename = sanitize_filename(&upload.filename).ok_or_else(|| Error::bad_request("Invalid filename"))?;
    let kind = storage::extension(&filename)
        .and_then(|ext| DocumentKind::from_extension(&ext))
        .ok_or_else(|| Error::bad_request("File type not allowed"))?;

    let path = state.storage.upload_path(&filename)?;
    tokio::fs::write(&path, &upload.bytes).await?;
    info!(filename = %filename, size = upload.bytes.len(), kind = %kind, "Stored upload");

    let metadata = file_metadata(&path).await?;

    let inspect_path = path.clone();
    let inspection = run_blocking(move || convert::inspect(&inspect_path, kind))
        .await?
        .map_err(|e| {
            warn!(filename = %filename, "Could not inspect upload: {}", e);
            e.to_string()
        });

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        file_info: UploadedFileInfo::new(metadata, kind, inspection, path.display().to_string()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    tag = "files",
    summary = "Download converted file",
    description = "Streams a file from the output directory as an attachment.",
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 403, description = "Name resolves outside the output directory"),
        (status = 404, description = "File not found"),
    ),
    params(
        ("filename" = String, Path, description = "Name of the converted file")
    )
)]
#[instrument(skip(state))]
pub async fn download_file(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response> {
    let path = state.storage.output_path(&filename)?;
    let file = open_regular_file(&path).await?.ok_or_else(|| Error::not_found(&filename))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(filename);
    Ok(attachment(file, &name, "application/octet-stream"))
}

#[utoipa::path(
    get,
    path = "/api/file/{filename}/info",
    tag = "files",
    summary = "Describe converted file",
    description = "Returns filesystem metadata and share links for a file in the output directory.",
    responses(
        (status = 200, description = "File information", body = FileInfoResponse),
        (status = 403, description = "Name resolves outside the output directory"),
        (status = 404, description = "File not found"),
    ),
    params(
        ("filename" = String, Path, description = "Name of the converted file")
    )
)]
#[instrument(skip(state))]
pub async fn get_file_info(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Json<FileInfoResponse>> {
    let path = state.storage.output_path(&filename)?;
    if !tokio::fs::try_exists(&path).await? {
        return Err(Error::not_found(filename));
    }

    let metadata = file_metadata(&path).await?;
    let share_links = share_links(&state.config.public_url, &metadata.filename, &metadata.size_human);

    Ok(Json(FileInfoResponse {
        success: true,
        file: metadata,
        share_links,
    }))
}

/// Open `path` for streaming if it is an existing regular file.
pub(crate) async fn open_regular_file(path: &std::path::Path) -> Result<Option<tokio::fs::File>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !file.metadata().await?.is_file() {
        return Ok(None);
    }
    Ok(Some(file))
}

/// Stream `file` back as a download named `filename`.
pub(crate) fn attachment(file: tokio::fs::File, filename: &str, content_type: &'static str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace(['"', '\\'], "_"));
    let disposition = HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{DocumentFixture, TestApp, WorkbookFixture, create_test_app, create_test_app_with, create_test_config};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;

    fn file_form(name: &str, bytes: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(name))
    }

    async fn upload(app: &TestApp, name: &str, bytes: Vec<u8>) -> axum_test::TestResponse {
        app.server.post("/api/upload").multipart(file_form(name, bytes)).await
    }

    #[tokio::test]
    async fn test_upload_spreadsheet() {
        let app = create_test_app().await;
        let workbook = WorkbookFixture::new("Sales")
            .row(&["Region", "Units"])
            .row(&["North", "10"])
            .sheet("Notes");

        let response = upload(&app, "Ventas año.xlsx", workbook.to_bytes()).await;

        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["success"], true);
        let info = &json["file_info"];
        assert_eq!(info["filename"], "Ventas_ano.xlsx");
        assert_eq!(info["unique_filename"], "Ventas_ano.xlsx");
        assert_eq!(info["type"], "excel");
        assert_eq!(info["extension"], ".xlsx");
        assert_eq!(info["available_conversions"], serde_json::json!(["word", "csv", "json"]));
        assert_eq!(info["rows"], 1);
        assert_eq!(info["columns"], 2);
        assert_eq!(info["sheets"], serde_json::json!(["Sales", "Notes"]));
        assert!(info.get("paragraphs").is_none());

        let stored = app.config.storage.upload_dir.join("Ventas_ano.xlsx");
        assert!(stored.exists());
        assert_eq!(info["filepath"], stored.display().to_string());
    }

    #[tokio::test]
    async fn test_upload_document() {
        let app = create_test_app().await;
        let doc = DocumentFixture::new().heading(1, "Title").paragraph("two words").table(&[&["a", "b"]]);

        let response = upload(&app, "notes.docx", doc.to_bytes()).await;

        response.assert_status_ok();
        let info = &response.json::<Value>()["file_info"];
        assert_eq!(info["type"], "word");
        assert_eq!(info["available_conversions"], serde_json::json!(["excel"]));
        assert_eq!(info["paragraphs"], 2);
        assert_eq!(info["tables"], 1);
        assert_eq!(info["total_words"], 3);
    }

    #[tokio::test]
    async fn test_upload_pdf_and_broken_files_are_still_stored() {
        let app = create_test_app().await;

        let response = upload(&app, "scan.pdf", b"%PDF-1.4".to_vec()).await;
        response.assert_status_ok();
        let info = &response.json::<Value>()["file_info"];
        assert_eq!(info["type"], "pdf");
        assert_eq!(info["available_conversions"], serde_json::json!([]));

        let response = upload(&app, "broken.xlsx", b"not a zip".to_vec()).await;
        response.assert_status_ok();
        let info = &response.json::<Value>()["file_info"];
        assert_eq!(info["type"], "excel");
        assert!(info["error"].is_string());
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = create_test_app().await;

        let response = upload(&app, "script.exe", b"MZ".to_vec()).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "File type not allowed");

        let response = upload(&app, "", b"x".to_vec()).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Empty filename");

        let form = MultipartForm::new().add_text("other", "value");
        let response = app.server.post("/api/upload").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = create_test_config(dir.path());
        config.max_upload_size = 1024;
        let app = create_test_app_with(config, dir).await;

        let response = upload(&app, "big.pdf", vec![b'x'; 4096]).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!app.config.storage.upload_dir.join("big.pdf").exists());
    }

    #[tokio::test]
    async fn test_download_and_info() {
        let app = create_test_app().await;
        std::fs::write(app.config.storage.output_dir.join("report_excel_to_csv_2024-05-06.csv"), "a,b\n").unwrap();

        let response = app.server.get("/api/download/report_excel_to_csv_2024-05-06.csv").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/octet-stream");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"report_excel_to_csv_2024-05-06.csv\""
        );
        assert_eq!(response.text(), "a,b\n");

        let response = app.server.get("/api/file/report_excel_to_csv_2024-05-06.csv/info").await;
        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["success"], true);
        assert_eq!(json["file"]["size"], 4);
        assert_eq!(json["file"]["size_human"], "4.00 B");
        assert_eq!(json["file"]["mime_type"], "text/csv");
        assert_eq!(
            json["share_links"]["direct"],
            "http://docs.test/api/download/report_excel_to_csv_2024-05-06.csv"
        );
    }

    #[tokio::test]
    async fn test_download_missing_and_outside() {
        let app = create_test_app().await;
        std::fs::write(app.config.storage.upload_dir.join("secret.xlsx"), "x").unwrap();

        let response = app.server.get("/api/download/nope.csv").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "File not found");

        let response = app.server.get("/api/download/..%2Fuploads%2Fsecret.xlsx").await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = app.server.get("/api/file/nope.csv/info").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
