//! API request and response data models.
//!
//! These structures define the public JSON contract of the service. All of them derive
//! `utoipa::ToSchema` so they appear in the OpenAPI document.
//!
//! # Model Categories
//!
//! - [`files`]: upload results and file information
//! - [`process`]: conversion requests and their output description
//! - [`share`]: share-by-email payloads
//! - [`cleanup`]: manual cleanup
//! - [`health`]: liveness responses
//! - [`assistant`]: workbook assistant chat and status

pub mod assistant;
pub mod cleanup;
pub mod files;
pub mod health;
pub mod process;
pub mod share;
