//! HTTP handler for running conversions.

use axum::{Json, extract::State};
use chrono::Local;
use tracing::{info, instrument};

use crate::{
    AppState,
    api::{
        handlers::run_blocking,
        models::process::{ProcessOutput, ProcessRequest, ProcessResponse},
    },
    convert::{self, Action},
    errors::{Error, Result},
    share::{download_path, share_links},
    storage::{file_metadata, output_filename},
};

#[utoipa::path(
    post,
    path = "/api/process",
    tag = "conversion",
    summary = "Convert file",
    description = "Converts an uploaded file. `filepath` is the value returned by `/api/upload`.

| action | source | options |
|---|---|---|
| `excel_to_word` | `.xlsx`, `.xls` | `include_header`, `include_stats`, `table_style` |
| `word_to_excel` | `.docx` | `extract_tables`, `extract_text`, `extract_headings`, `include_metadata` |
| `excel_to_csv` | `.xlsx`, `.xls` | none |
| `excel_to_json` | `.xlsx`, `.xls` | none |

The output is named `<name>_<action>_<date>.<ext>`; converting the same file twice on the same day replaces the earlier result.",
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Conversion finished", body = ProcessResponse),
        (status = 400, description = "Unknown action, wrong source type or invalid options"),
        (status = 403, description = "Path resolves outside the upload directory"),
        (status = 404, description = "File not found"),
        (status = 422, description = "The document has nothing to extract"),
        (status = 500, description = "Conversion failed")
    )
)]
#[instrument(skip_all, fields(action = %request.action))]
pub async fn process_file(State(state): State<AppState>, Json(request): Json<ProcessRequest>) -> Result<Json<ProcessResponse>> {
    if request.filepath.trim().is_empty() {
        return Err(Error::not_found(""));
    }
    let input = state.storage.upload_path(&request.filepath)?;
    if !tokio::fs::try_exists(&input).await? {
        return Err(Error::not_found(&request.filepath));
    }

    let action: Action = request.action.parse().map_err(Error::bad_request)?;

    let now = Local::now().naive_local();
    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = output_filename(&source_name, action.as_str(), action.output_extension(), now.date());
    let output = state.storage.output_path(&filename)?;

    info!(input = %input.display(), output = %output.display(), "Converting");
    let (from, to) = (input.clone(), output.clone());
    run_blocking(move || convert::run(action, &from, &to, &request.options, now)).await??;

    let metadata = file_metadata(&output).await?;
    let share_links = share_links(&state.config.public_url, &filename, &metadata.size_human);

    Ok(Json(ProcessResponse {
        success: true,
        message: "File processed successfully".to_string(),
        output: ProcessOutput {
            download_url: download_path(&filename),
            path: output.display().to_string(),
            filename,
            metadata,
            share_links,
        },
    }))
}
