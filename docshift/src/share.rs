//! Share links for converted files.
//!
//! Nothing is sent from the server; these are URLs the frontend opens in the user's browser or
//! mail client. All query values are percent-encoded.

use serde::{Deserialize, Serialize};
use url::Url;
use url::form_urlencoded::byte_serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareLinks {
    pub whatsapp: String,
    pub telegram: String,
    pub twitter: String,
    pub facebook: String,
    pub linkedin: String,
    pub email: String,
    pub direct: String,
}

/// Server-relative download path for a file in the output directory.
pub fn download_path(filename: &str) -> String {
    format!("/api/download/{}", encode(filename))
}

/// Absolute download URL for a file in the output directory.
pub fn download_url(public_url: &Url, filename: &str) -> String {
    format!("{}{}", public_url.as_str().trim_end_matches('/'), download_path(filename))
}

pub fn share_links(public_url: &Url, filename: &str, size_human: &str) -> ShareLinks {
    let download = download_url(public_url, filename);
    let text = format!("File: {filename} ({size_human})");
    let message = format!("{text} {download}");

    ShareLinks {
        whatsapp: format!("https://wa.me/?text={}", encode(&message)),
        telegram: format!(
            "https://t.me/share/url?url={}&text={}",
            encode(&download),
            encode(&text)
        ),
        twitter: format!(
            "https://twitter.com/intent/tweet?text={}&url={}",
            encode(&text),
            encode(&download)
        ),
        facebook: format!("https://www.facebook.com/sharer/sharer.php?u={}", encode(&download)),
        linkedin: format!(
            "https://www.linkedin.com/sharing/share-offsite/?url={}",
            encode(&download)
        ),
        email: format!("mailto:?subject={}&body={}", encode(filename), encode(&message)),
        direct: download,
    }
}

/// `mailto:` link addressed to `recipient` describing the file.
pub fn mailto_link(recipient: Option<&str>, filename: &str, size_human: &str) -> String {
    let recipient = recipient.map(str::trim).unwrap_or_default();
    let subject = format!("Shared file: {filename}");
    let body = format!("Hello,\n\nI am sharing the file {filename} ({size_human}) with you.");
    format!(
        "mailto:{}?subject={}&body={}",
        encode(recipient),
        encode(&subject),
        encode(&body)
    )
}

/// Percent-encode a query value. Spaces become `%20`, which mail clients decode where `+` is
/// taken literally.
fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}
