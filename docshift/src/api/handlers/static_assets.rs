//! HTTP handlers for serving the built frontend.

use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, instrument};

use crate::AppState;
use crate::storage::resolve_within;

const NOT_BUILT: &str = "<h1>Frontend not built</h1>\
<p>Build the frontend and point <code>static_dir</code> at its output directory, then restart the server.</p>";

/// Serve files from the configured `static_dir` with SPA fallback.
///
/// Unknown `/api/*` and `/download/*` paths get a JSON 404 instead of the SPA shell.
#[instrument(skip(state))]
pub async fn serve_frontend(State(state): State<AppState>, uri: Uri) -> Response {
    let request_path = uri.path();
    if request_path.starts_with("/api") || request_path.starts_with("/download") {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response();
    }

    let Some(root) = state.config.static_dir.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, Html(NOT_BUILT)).into_response();
    };

    let mut path = request_path.trim_start_matches('/');
    // If path is empty or ends with /, serve index.html
    if path.is_empty() || path.ends_with('/') {
        path = "index.html";
    }

    // Try to serve the requested file
    if let Some(file) = asset_path(root, path)
        && let Ok(content) = tokio::fs::read(&file).await
    {
        let mime = mime_guess::from_path(&file).first_or_octet_stream();

        // Vite hashed assets can be cached indefinitely
        let cache_control = if path.starts_with("assets/") {
            "public, max-age=31536000, immutable"
        } else {
            // HTML and other files should not be cached
            "no-cache"
        };

        return (
            [
                (header::CONTENT_TYPE, mime.as_ref().to_string()),
                (header::CACHE_CONTROL, cache_control.to_string()),
            ],
            content,
        )
            .into_response();
    }

    // If not found, serve index.html for SPA client-side routing
    debug!("Hitting SPA fallback for: {}", request_path);
    match tokio::fs::read(root.join("index.html")).await {
        Ok(index) => (
            [(header::CONTENT_TYPE, "text/html"), (header::CACHE_CONTROL, "no-cache")],
            index,
        )
            .into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Html(NOT_BUILT)).into_response(),
    }
}

/// A regular file below `root`, if the request names one.
fn asset_path(root: &Path, path: &str) -> Option<PathBuf> {
    let file = resolve_within(root, Path::new(path)).ok()?;
    file.is_file().then_some(file)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app, create_test_app_with, create_test_config};
    use axum::http::StatusCode;
    use serde_json::Value;
    use tempfile::TempDir;

    async fn app_with_frontend() -> crate::test_utils::TestApp {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(dist.join("assets")).unwrap();
        std::fs::write(dist.join("index.html"), "<!doctype html><div id=\"root\"></div>").unwrap();
        std::fs::write(dist.join("favicon.svg"), "<svg/>").unwrap();
        std::fs::write(dist.join("assets/index-3f2a.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        let mut config = create_test_config(dir.path());
        config.static_dir = Some(dist);
        create_test_app_with(config, dir).await
    }

    fn header(response: &axum_test::TestResponse, name: &str) -> String {
        response.header(name).to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_serve_root_returns_index_html() {
        let app = app_with_frontend().await;

        let response = app.server.get("/").await;

        response.assert_status_ok();
        assert_eq!(header(&response, "content-type"), "text/html");
        assert_eq!(header(&response, "cache-control"), "no-cache");
        assert!(response.text().contains("<!doctype html>"));
    }

    #[tokio::test]
    async fn test_serve_favicon() {
        let app = app_with_frontend().await;

        let response = app.server.get("/favicon.svg").await;

        response.assert_status_ok();
        assert_eq!(header(&response, "content-type"), "image/svg+xml");
        assert_eq!(header(&response, "cache-control"), "no-cache");
    }

    #[tokio::test]
    async fn test_hashed_assets_have_immutable_cache() {
        let app = app_with_frontend().await;

        let response = app.server.get("/assets/index-3f2a.js").await;

        response.assert_status_ok();
        assert_eq!(header(&response, "cache-control"), "public, max-age=31536000, immutable");
    }

    #[tokio::test]
    async fn test_spa_fallback_and_traversal() {
        let app = app_with_frontend().await;

        let response = app.server.get("/history/42").await;
        response.assert_status_ok();
        assert!(response.text().contains("id=\"root\""));

        // Leaving the static directory falls back to the SPA shell
        let response = app.server.get("/..%2Fsecret.txt").await;
        response.assert_status_ok();
        assert!(!response.text().contains("nope"));
    }

    #[tokio::test]
    async fn test_unknown_api_paths_are_json_404() {
        let app = app_with_frontend().await;

        for path in ["/api/nothing", "/download/other.xlsx"] {
            let response = app.server.get(path).await;
            response.assert_status(StatusCode::NOT_FOUND);
            assert_eq!(response.json::<Value>()["error"], "Not found");
        }
    }

    #[tokio::test]
    async fn test_no_build_is_503() {
        let app = create_test_app().await;

        let response = app.server.get("/").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.text().contains("Frontend not built"));
    }
}
