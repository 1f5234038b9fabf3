//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Files** (`/api/upload`, `/api/download/*`, `/api/file/*/info`): upload, inspection, download
//! - **Conversion** (`/api/process`): run a conversion on an uploaded file
//! - **Sharing** (`/api/share/email`): share links for converted files
//! - **Maintenance** (`/api/health`, `/api/cleanup`): liveness and manual cleanup
//! - **Workbook assistant** (`/api/bot/*`): chat-driven edits of the active workbook
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The rendered reference is served at
//! `/docs` when the server is running.

pub mod handlers;
pub mod models;
