//! HTTP handler for the service health check.

use axum::{Json, extract::State};
use chrono::{Local, SecondsFormat};

use crate::AppState;
use crate::api::models::health::{HealthResponse, HealthServices};

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    summary = "Health check",
    description = "Reports that the service is up, with its version and the state of each part of it.",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let running = |on: bool| if on { "running" } else { "disabled" }.to_string();

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Document conversion service is running".to_string(),
        timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: HealthServices {
            converter: running(true),
            assistant: running(true),
            janitor: running(state.config.janitor.enabled),
        },
    })
}
