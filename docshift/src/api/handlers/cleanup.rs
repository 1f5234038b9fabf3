//! HTTP handler for removing stale files on demand.

use std::time::Duration;

use axum::{Json, extract::State};
use tracing::{info, instrument};

use crate::{
    AppState,
    api::{
        handlers::run_blocking,
        models::cleanup::{CleanupRequest, CleanupResponse, DEFAULT_MAX_AGE_HOURS},
    },
    errors::{Error, Result},
};

#[utoipa::path(
    post,
    path = "/api/cleanup",
    tag = "maintenance",
    summary = "Remove stale files",
    description = "Deletes uploads and conversion outputs last modified more than `max_age_hours` ago. \
The body is optional; the default age is 24 hours. The assistant's active workbook is never removed.",
    request_body(content = CleanupRequest, description = "Optional; omit the body to use the default age"),
    responses(
        (status = 200, description = "Cleanup finished", body = CleanupResponse),
        (status = 400, description = "Negative or non-numeric age"),
    )
)]
#[instrument(skip_all)]
pub async fn cleanup(State(state): State<AppState>, request: Option<Json<CleanupRequest>>) -> Result<Json<CleanupResponse>> {
    let hours = request
        .and_then(|Json(r)| r.max_age_hours)
        .unwrap_or(DEFAULT_MAX_AGE_HOURS);
    let max_age = Duration::try_from_secs_f64(hours * 3600.0)
        .map_err(|_| Error::bad_request(format!("Invalid max_age_hours: {hours}")))?;

    let storage = state.storage.clone();
    let deleted_count = run_blocking(move || storage.sweep(max_age)).await??;
    info!(deleted_count, max_age_hours = hours, "Manual cleanup finished");

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("{deleted_count} file(s) deleted"),
        deleted_count,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn write_aged(path: &std::path::Path, age: Duration) {
        std::fs::write(path, b"x").unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_default_age() {
        let app = create_test_app().await;
        let storage = &app.config.storage;
        write_aged(&storage.upload_dir.join("old.xlsx"), Duration::from_secs(30 * 3600));
        write_aged(&storage.output_dir.join("old.csv"), Duration::from_secs(30 * 3600));
        write_aged(&storage.output_dir.join("new.csv"), Duration::from_secs(3600));

        let response = app.server.post("/api/cleanup").await;

        response.assert_status_ok();
        let json: Value = response.json();
        assert_eq!(json["deleted_count"], 2);
        assert_eq!(json["message"], "2 file(s) deleted");
        assert!(storage.output_dir.join("new.csv").exists());
    }

    #[tokio::test]
    async fn test_cleanup_custom_age() {
        let app = create_test_app().await;
        write_aged(&app.config.storage.output_dir.join("recent.csv"), Duration::from_secs(2 * 3600));

        let response = app.server.post("/api/cleanup").json(&json!({ "max_age_hours": 1 })).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["deleted_count"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_rejects_negative_age() {
        let app = create_test_app().await;

        let response = app.server.post("/api/cleanup").json(&json!({ "max_age_hours": -1 })).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
