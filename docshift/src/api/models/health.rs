use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    pub message: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub version: String,
    pub services: HealthServices,
}

/// State of each part of the service: `running` or `disabled`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthServices {
    pub converter: String,
    pub assistant: String,
    pub janitor: String,
}
