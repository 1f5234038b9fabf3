use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailShareRequest {
    /// A file in the output directory
    pub filename: String,
    /// Address to prefill; may be omitted
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailShareResponse {
    pub success: bool,
    /// Always `email`
    pub method: String,
    pub mailto_link: String,
    pub message: String,
}
