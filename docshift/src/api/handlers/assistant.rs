//! HTTP handlers for the workbook assistant.
//!
//! The assistant keeps a single active workbook in the data directory. A client uploads a
//! spreadsheet, edits it through chat commands (see [`crate::workbook::command`]) and downloads
//! the result. Every read-modify-write of the workbook happens under
//! [`AppState::workbook_lock`](crate::AppState).
//!
//! Replies are plain text meant to be shown in a chat window. Failures answer with a `reply`
//! body as well, so the client can show them the same way.

use std::path::Path;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::{
        handlers::{
            files::{attachment, open_regular_file},
            read_file_field, run_blocking,
        },
        models::assistant::{AssistantHealth, AssistantReply, ChatRequest, ChatResponse, WorkbookStatus},
    },
    errors::{Error, Result},
    storage::{self, file_metadata, format_bytes},
    workbook::{Command, Workbook, WorkbookError, column_name, parse_command},
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const COMMAND_HELP: &str = "Available commands:
- put 1500 in Sheet1 A2
- put formula =SUM(A1:A10) in Sheet1 C2
- calculate B2*1.19 in Sheet1 D2
- delete row 5 in Sheet1
- combine column A with column B in Sheet1 into C
- list sheets

Spanish works too: pon 1500 en Hoja1 A2, elimina la fila 5 en Hoja1, lista hojas.";

/// A failed assistant request, answered as `{ok: false, reply}`.
#[derive(Debug)]
pub struct AssistantRejection {
    status: StatusCode,
    reply: String,
}

impl AssistantRejection {
    fn bad_request(reply: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reply: reply.into(),
        }
    }
}

impl From<Error> for AssistantRejection {
    fn from(e: Error) -> Self {
        let status = e.status_code();
        if status.is_server_error() {
            tracing::error!("Workbook upload failed: {:#}", e);
        }
        Self {
            status,
            reply: format!("Error uploading the file: {}", e.user_message()),
        }
    }
}

impl IntoResponse for AssistantRejection {
    fn into_response(self) -> Response {
        let body = AssistantReply {
            ok: false,
            reply: self.reply,
        };
        (self.status, Json(body)).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/bot/health",
    tag = "assistant",
    summary = "Assistant health",
    responses(
        (status = 200, description = "Assistant is available", body = AssistantHealth),
    )
)]
#[tracing::instrument]
pub async fn health() -> Json<AssistantHealth> {
    Json(AssistantHealth {
        status: "ok".to_string(),
        assistant: "Workbook assistant".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Outcome of validating an uploaded workbook.
enum Install {
    Installed(Vec<String>),
    Invalid(WorkbookError),
}

#[utoipa::path(
    post,
    path = "/api/bot/upload",
    tag = "assistant",
    summary = "Load workbook",
    description = "Makes the uploaded `.xlsx` or `.xls` file the active workbook, replacing any previous one. \
Legacy `.xls` files are stored as `.xlsx`.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form with a `file` field"
    ),
    responses(
        (status = 200, description = "Workbook loaded", body = AssistantReply),
        (status = 400, description = "No file, not a spreadsheet, or unreadable", body = AssistantReply),
        (status = 413, description = "File exceeds the configured size limit", body = AssistantReply),
    )
)]
#[instrument(skip_all)]
pub async fn upload_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<AssistantReply>, AssistantRejection> {
    let upload = read_file_field(&mut multipart, state.config.max_upload_size)
        .await?
        .ok_or_else(|| AssistantRejection::bad_request("No file received."))?;

    let extension = match storage::extension(&upload.filename).as_deref() {
        Some(ext @ ("xlsx" | "xls")) => ext.to_string(),
        _ => return Err(AssistantRejection::bad_request("Only Excel files (.xlsx or .xls) are accepted.")),
    };

    let active = state.storage.active_workbook_path();
    let staged = active.with_file_name(format!("incoming.{extension}"));

    let _guard = state.workbook_lock.lock().await;
    tokio::fs::write(&staged, &upload.bytes).await.map_err(Error::from)?;

    let target = active.clone();
    let outcome = run_blocking(move || install_workbook(&staged, &target, &extension))
        .await?
        .map_err(Error::from)?;

    let sheets = match outcome {
        Install::Installed(sheets) => sheets,
        Install::Invalid(e) => {
            warn!(filename = %upload.filename, "Rejected workbook upload: {}", e);
            return Err(AssistantRejection::bad_request("The file does not look like a valid Excel workbook."));
        }
    };

    let size = tokio::fs::metadata(&active).await.map_err(Error::from)?.len();
    info!(filename = %upload.filename, size, sheets = sheets.len(), "Active workbook replaced");

    Ok(Json(AssistantReply {
        ok: true,
        reply: format!(
            "Workbook loaded.\n\nFile: {}\nSize: {}\nSheets: {}\n\n{COMMAND_HELP}\n\nDownload the modified file when you are done.",
            upload.filename,
            format_bytes(size),
            sheets.join(", ")
        ),
    }))
}

/// Check that `staged` opens as a workbook and move it into place as `active`.
fn install_workbook(staged: &Path, active: &Path, extension: &str) -> std::result::Result<Install, WorkbookError> {
    let book = match Workbook::open(staged) {
        Ok(book) => book,
        Err(e) => {
            let _ = std::fs::remove_file(staged);
            return Ok(Install::Invalid(e));
        }
    };

    if extension == "xlsx" {
        std::fs::rename(staged, active)?;
    } else {
        let saved = book.save(active);
        let _ = std::fs::remove_file(staged);
        saved?;
    }
    Ok(Install::Installed(book.sheet_names()))
}

#[utoipa::path(
    get,
    path = "/api/bot/download",
    tag = "assistant",
    summary = "Download workbook",
    description = "Downloads the active workbook as `modified_<epoch-ms>.xlsx`. Also served at `/download/active.xlsx`.",
    responses(
        (status = 200, description = "Workbook content", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 404, description = "No active workbook"),
    )
)]
#[instrument(skip_all)]
pub async fn download_workbook(State(state): State<AppState>) -> Result<Response> {
    let path = state.storage.active_workbook_path();

    // Saves replace the file by rename, so a handle opened here stays consistent
    let file = {
        let _guard = state.workbook_lock.lock().await;
        open_regular_file(&path).await?
    };
    let file = file.ok_or_else(|| Error::NotFound {
        resource: "Active workbook".to_string(),
        id: path.display().to_string(),
    })?;

    let filename = format!("modified_{}.xlsx", Utc::now().timestamp_millis());
    Ok(attachment(file, &filename, XLSX_MIME))
}

#[utoipa::path(
    get,
    path = "/api/bot/status",
    tag = "assistant",
    summary = "Workbook status",
    responses(
        (status = 200, description = "Active workbook details, or `active: false`", body = WorkbookStatus),
    )
)]
#[instrument(skip_all)]
pub async fn status(State(state): State<AppState>) -> Result<Json<WorkbookStatus>> {
    let path = state.storage.active_workbook_path();
    let _guard = state.workbook_lock.lock().await;

    if !tokio::fs::try_exists(&path).await? {
        return Ok(Json(WorkbookStatus::Inactive {
            active: false,
            message: "No active workbook. Upload an Excel file to begin.".to_string(),
        }));
    }

    let metadata = file_metadata(&path).await?;
    let mtime = tokio::fs::metadata(&path).await?.modified()?;

    let book_path = path.clone();
    let sheets = run_blocking(move || Workbook::open(&book_path).map(|book| book.sheet_names())).await??;

    Ok(Json(WorkbookStatus::Active {
        active: true,
        path: path.display().to_string(),
        size: metadata.size,
        size_human: metadata.size_human,
        sheet_count: sheets.len(),
        sheets,
        mtime: DateTime::<Local>::from(mtime).to_rfc3339_opts(SecondsFormat::Secs, false),
    }))
}

#[utoipa::path(
    post,
    path = "/api/bot/chat",
    tag = "assistant",
    summary = "Run a chat command",
    description = "Parses one command and applies it to the active workbook.

Commands (case-insensitive, English or Spanish):
- `put <value> in <sheet> <cell>` / `pon <value> en <sheet> <cell>`
- `put formula <formula> in <sheet> <cell>` / `pon la fórmula <formula> en <sheet> <cell>`
- `calculate <expression> in <sheet> <cell>` / `calcula <expression> en <sheet> <cell>`
- `delete row <n> in <sheet>` / `elimina la fila <n> en <sheet>`
- `combine column <A> with column <B> in <sheet> into <C>` / `combina columna <A> con columna <B> en <sheet> y ponlo en <C>`
- `list sheets` / `lista hojas`

Unrecognised input is answered with the list of commands.",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Command handled", body = ChatResponse),
        (status = 500, description = "The command failed", body = ChatResponse),
    )
)]
#[instrument(skip_all)]
pub async fn chat(State(state): State<AppState>, request: Option<Json<ChatRequest>>) -> Response {
    let message = request.map(|Json(r)| r.message).unwrap_or_default();
    let message = message.trim();
    if message.is_empty() {
        return Json(ChatResponse::reply(
            "Type an instruction to work with the workbook.\n\nExample: put 100 in Sheet1 A1",
        ))
        .into_response();
    }

    let path = state.storage.active_workbook_path();
    let _guard = state.workbook_lock.lock().await;

    match tokio::fs::try_exists(&path).await {
        Ok(true) => {}
        Ok(false) => {
            return Json(ChatResponse::reply(
                "No workbook is loaded.\n\nUpload an Excel file first with the attach button.",
            ))
            .into_response();
        }
        Err(e) => return chat_failure(Error::from(e)),
    }

    let command = parse_command(message);
    info!(?command, "Running assistant command");

    match run_blocking(move || execute(&path, command)).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => chat_failure(Error::from(e)),
        Err(e) => chat_failure(e),
    }
}

fn chat_failure(e: Error) -> Response {
    warn!("Assistant command failed: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ChatResponse::reply(format!("Error processing your request:\n{e}"))),
    )
        .into_response()
}

/// Apply `command` to the workbook at `path`, saving it when it changed.
fn execute(path: &Path, command: Command) -> std::result::Result<ChatResponse, WorkbookError> {
    let mut book = Workbook::open(path)?;

    let reply = match command {
        Command::Unknown => {
            return Ok(ChatResponse::reply(format!("I did not understand that command.\n\n{COMMAND_HELP}")));
        }
        Command::ListSheets => {
            let lines: Vec<String> = book
                .sheet_names()
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{}. {name}", i + 1))
                .collect();
            return Ok(ChatResponse::reply(format!("Available sheets:\n{}", lines.join("\n"))));
        }
        Command::SetValue { sheet, cell, value } => {
            book.set_value(&sheet, cell, &value)?;
            book.save(path)?;
            let size = std::fs::metadata(path)?.len();
            format!(
                "Done.\n\nPut \"{value}\" in:\nSheet: {sheet}\nCell: {cell}\n\nWorkbook updated: {}\nYou can download the modified file.",
                format_bytes(size)
            )
        }
        Command::SetFormula { sheet, cell, formula } => {
            book.set_formula(&sheet, cell, &formula)?;
            book.save(path)?;
            format!(
                "Formula added.\n\nFormula: ={}\nSheet: {sheet}\nCell: {cell}\n\nExcel calculates the result when the file is opened.",
                formula.trim_start_matches('=')
            )
        }
        Command::DeleteRow { sheet, row } => {
            book.delete_row(&sheet, row)?;
            book.save(path)?;
            format!("Row deleted.\n\nRow {row} of sheet \"{sheet}\" was removed.")
        }
        Command::CombineColumns {
            sheet,
            first,
            second,
            destination,
        } => {
            book.combine_columns(&sheet, first, second, destination)?;
            book.save(path)?;
            format!(
                "Columns combined.\n\nColumn {} + column {}\nResult in column {}\nSheet: {sheet}",
                column_name(first),
                column_name(second),
                column_name(destination)
            )
        }
    };

    Ok(ChatResponse::changed(reply))
}
