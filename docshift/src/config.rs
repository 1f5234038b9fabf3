//! Configuration management for docshift.
//!
//! Configuration is loaded from a YAML file (default `config.yaml`) and can be overridden
//! by environment variables prefixed with `DOCSHIFT_`. Nested keys use a double underscore:
//!
//! ```bash
//! DOCSHIFT_PORT=8080
//! DOCSHIFT_STORAGE__UPLOAD_DIR=/var/lib/docshift/uploads
//! DOCSHIFT_JANITOR__MAX_AGE=12h
//! ```
//!
//! # Example
//!
//! ```yaml
//! host: "0.0.0.0"
//! port: 3000
//! public_url: "https://docs.example.com"
//! max_upload_size: 16777216
//!
//! storage:
//!   upload_dir: "temp_uploads"
//!   output_dir: "temp_outputs"
//!   data_dir: "data"
//!
//! janitor:
//!   enabled: true
//!   interval: 1h
//!   max_age: 24h
//!
//! cors:
//!   allowed_origins:
//!     - "http://localhost:3000"
//!   allow_credentials: true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Uploads larger than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "docshift", about = "Document conversion service")]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DOCSHIFT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, so an empty or missing config file yields a working local setup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Externally reachable base URL, used to build download and share links
    pub public_url: Url,
    /// Where uploads, conversion outputs and the assistant's workbook live
    pub storage: StorageConfig,
    /// Maximum accepted size of a single uploaded file, in bytes
    pub max_upload_size: usize,
    /// Periodic removal of stale temporary files
    pub janitor: JanitorConfig,
    /// CORS settings for browser clients
    pub cors: CorsConfig,
    /// Directory holding the built frontend. When unset or missing, `/` answers 503.
    pub static_dir: Option<PathBuf>,
    /// Export traces to an OTLP collector (configured through the standard OTEL_* variables)
    pub enable_otel_export: bool,
}

/// Storage directories. Relative paths are resolved against the working directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Uploaded source files
    pub upload_dir: PathBuf,
    /// Converted files offered for download
    pub output_dir: PathBuf,
    /// Long-lived data such as the assistant's active workbook
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("temp_uploads"),
            output_dir: PathBuf::from("temp_outputs"),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Background cleanup of the upload and output directories.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JanitorConfig {
    pub enabled: bool,
    /// How often the sweep runs
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Files last modified longer ago than this are deleted
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60 * 60),
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let origins = ["http://localhost:3000", "http://127.0.0.1:3000"];
        Self {
            allowed_origins: origins
                .iter()
                .filter_map(|o| Url::parse(o).ok())
                .map(CorsOrigin::Url)
                .collect(),
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: Url::parse("http://localhost:3000").unwrap_or_else(|_| unreachable!("static URL parses")),
            storage: StorageConfig::default(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            janitor: JanitorConfig::default(),
            cors: CorsConfig::default(),
            static_dir: None,
            enable_otel_export: false,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_upload_size == 0 {
            return Err(Error::Other(anyhow!("Config validation: max_upload_size must be greater than zero")));
        }

        if self.janitor.enabled && self.janitor.interval.is_zero() {
            return Err(Error::Other(anyhow!(
                "Config validation: janitor.interval must be greater than zero when the janitor is enabled"
            )));
        }

        if !matches!(self.public_url.scheme(), "http" | "https") {
            return Err(Error::Other(anyhow!(
                "Config validation: public_url must use http or https, got '{}'",
                self.public_url.scheme()
            )));
        }

        // tower-http refuses to build a layer combining these
        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
            return Err(Error::Other(anyhow!(
                "Config validation: cors.allow_credentials cannot be combined with a '*' origin"
            )));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values
            .merge(Env::prefixed("DOCSHIFT_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
