//! HTTP handler for sharing converted files by email.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    AppState,
    api::models::share::{EmailShareRequest, EmailShareResponse},
    errors::{Error, Result},
    share::mailto_link,
    storage::file_metadata,
};

#[utoipa::path(
    post,
    path = "/api/share/email",
    tag = "sharing",
    summary = "Share by email",
    description = "Builds a `mailto:` link describing a converted file. Nothing is sent by the server; the client opens the link in the user's mail program.",
    request_body = EmailShareRequest,
    responses(
        (status = 200, description = "Link created", body = EmailShareResponse),
        (status = 403, description = "Name resolves outside the output directory"),
        (status = 404, description = "File not found"),
    )
)]
#[instrument(skip_all, fields(filename = %request.filename))]
pub async fn share_via_email(State(state): State<AppState>, Json(request): Json<EmailShareRequest>) -> Result<Json<EmailShareResponse>> {
    let path = state.storage.output_path(&request.filename)?;
    if !tokio::fs::try_exists(&path).await? {
        return Err(Error::not_found(request.filename));
    }

    let metadata = file_metadata(&path).await?;

    Ok(Json(EmailShareResponse {
        success: true,
        method: "email".to_string(),
        mailto_link: mailto_link(request.recipient.as_deref(), &metadata.filename, &metadata.size_human),
        message: "Open your email client to share the file".to_string(),
    }))
}
