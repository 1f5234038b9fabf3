//! # docshift: document conversion service
//!
//! `docshift` is a small HTTP backend that converts office documents. It accepts an upload,
//! reports what is inside it, converts it on request and hands the result back for download
//! together with links for sharing it.
//!
//! ## Conversions
//!
//! - spreadsheet (`.xlsx`, `.xls`) to Word document: the first sheet becomes a formatted table
//! - Word document (`.docx`) to spreadsheet: tables, text and outline become sheets
//! - spreadsheet to CSV and to JSON records
//!
//! See [`convert`] for the details of each conversion.
//!
//! ## Workbook assistant
//!
//! Besides one-shot conversions the service keeps one *active workbook* that can be edited
//! through short chat commands (`put 100 in Sheet1 B2`, `delete row 3 in Sheet1`, ...). See
//! [`workbook`] for the command language and [`api::handlers::assistant`] for the endpoints.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum). There is no database:
//! uploads and conversion outputs are plain files in two staging directories, swept by a
//! background [`janitor`] once they are older than the configured age. Conversions are
//! synchronous library calls and run on tokio's blocking pool.
//!
//! ### Request Flow
//!
//! 1. `POST /api/upload` stores the file under a sanitized name and inspects it
//! 2. `POST /api/process` converts it into the output directory
//! 3. `GET /api/download/{filename}` streams the result back
//!
//! ## Configuration
//!
//! Configuration comes from a YAML file merged with `DOCSHIFT_`-prefixed environment
//! variables. See [`config`] for every option.
//!
//! ## Getting Started
//!
//! ```bash
//! cargo run -- -f config.yaml
//! ```
//!
//! The OpenAPI reference is served at `/docs`.

pub mod api;
pub mod config;
pub mod convert;
pub mod errors;
pub mod janitor;
pub mod openapi;
pub mod share;
pub mod storage;
pub mod telemetry;
pub mod workbook;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::janitor::Janitor;
use crate::openapi::ApiDoc;
use crate::storage::Storage;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state handed to every request handler.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .storage(Storage::new(&config.storage))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
    /// Serialises every read-modify-write of the active workbook
    #[builder(default)]
    pub workbook_lock: Arc<Mutex<()>>,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the origin without a trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Everything under `/api` is JSON. The workbook assistant's download is also reachable at
/// `/download/active.xlsx`, and any other path falls through to the static frontend.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use crate::api::handlers::{assistant, cleanup, files, health, process, share, static_assets};

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(files::upload_file))
        .route("/process", post(process::process_file))
        .route("/download/{filename}", get(files::download_file))
        .route("/file/{filename}/info", get(files::get_file_info))
        .route("/share/email", post(share::share_via_email))
        .route("/cleanup", post(cleanup::cleanup))
        // Workbook assistant
        .route("/bot/health", get(assistant::health))
        .route("/bot/upload", post(assistant::upload_workbook))
        .route("/bot/download", get(assistant::download_workbook))
        .route("/bot/status", get(assistant::status))
        .route("/bot/chat", post(assistant::chat));

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/download/active.xlsx", get(assistant::download_workbook))
        .fallback(static_assets::serve_frontend)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let body_limit = state.config.max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    let router = router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(create_cors_layer(&state.config)?);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Currently this is the storage [`janitor`]. When dropped, the `drop_guard` cancels the
/// shutdown token, signalling all tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        // Signal all background tasks to shutdown
        self.shutdown_token.cancel();

        // Wait for all background tasks to complete
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(config: &Config, storage: &Storage, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if config.janitor.enabled {
        let janitor = Janitor::new(storage.clone(), config.janitor.interval, config.janitor.max_age);
        background_tasks.push(janitor.spawn(shutdown_token.clone()));
        info!(
            "Janitor started: sweeping every {} for files older than {}",
            humantime::format_duration(config.janitor.interval),
            humantime::format_duration(config.janitor.max_age)
        );
    } else {
        info!("Janitor disabled");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// The assembled service.
///
/// 1. **Create**: [`Application::new`] prepares the storage directories, starts the janitor
///    and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown signal resolves, background tasks are stopped and
///    telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting docshift with configuration: {:#?}", config);

        let storage = Storage::new(&config.storage);
        storage.ensure_dirs().await?;

        let shutdown_token = CancellationToken::new();
        let bg_services = setup_background_services(&config, &storage, shutdown_token);

        let app_state = AppState::builder().config(config.clone()).storage(storage).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "docshift listening on http://{}, available at {}",
            bind_addr, self.config.public_url
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        // Shutdown telemetry
        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
