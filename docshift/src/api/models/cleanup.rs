use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_MAX_AGE_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CleanupRequest {
    /// Delete files last modified more than this many hours ago (default 24)
    pub max_age_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub deleted_count: usize,
}
