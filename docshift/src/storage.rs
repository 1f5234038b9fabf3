//! Upload and output directories, filename handling and file metadata.
//!
//! Every client-supplied name goes through [`sanitize_filename`] and every client-supplied path
//! through [`resolve_within`] before the filesystem is touched.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

/// Extensions accepted by the upload endpoint.
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "docx", "pdf"];

const STEM_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            data_dir: config.data_dir.clone(),
        }
    }

    /// Create all storage directories.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.upload_dir, &self.output_dir, &self.data_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve a name or path that must live in the upload directory.
    pub fn upload_path(&self, candidate: &str) -> Result<PathBuf> {
        resolve_within(&self.upload_dir, Path::new(candidate))
    }

    /// Resolve a name that must live in the output directory.
    pub fn output_path(&self, candidate: &str) -> Result<PathBuf> {
        resolve_within(&self.output_dir, Path::new(candidate))
    }

    /// The workbook edited by the assistant.
    pub fn active_workbook_path(&self) -> PathBuf {
        self.data_dir.join("active.xlsx")
    }

    /// Delete regular files older than `max_age` from the upload and output directories.
    ///
    /// Returns how many files were removed. Files that cannot be inspected or removed are
    /// logged and skipped.
    pub fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for dir in [&self.upload_dir, &self.output_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            for entry in entries {
                let entry = entry?;
                let path = entry.path();
                let Ok(meta) = entry.metadata() else { continue };
                if !meta.is_file() {
                    continue;
                }
                let Ok(modified) = meta.modified() else { continue };

                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                if age <= max_age {
                    continue;
                }

                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), age_secs = age.as_secs(), "Removed stale file");
                        removed += 1;
                    }
                    Err(e) => warn!(path = %path.display(), "Failed to remove stale file: {}", e),
                }
            }
        }

        Ok(removed)
    }
}

/// Reduce a client-supplied filename to a safe ASCII name.
///
/// Accented letters are folded to ASCII, path separators and whitespace become underscores,
/// anything outside `[A-Za-z0-9._-]` is dropped and leading/trailing dots and underscores are
/// trimmed. Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let folded: String = name.chars().filter_map(fold_to_ascii).collect();
    let spaced = folded.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn fold_to_ascii(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let folded = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        c if c.is_whitespace() => ' ',
        _ => return None,
    };
    Some(folded)
}

/// Lowercased extension of a filename, without the dot.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether the filename carries one of [`ALLOWED_EXTENSIONS`].
pub fn is_allowed(name: &str) -> bool {
    extension(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Name for a conversion result: `<stem[..15]>_<action>_<YYYY-MM-DD>.<extension>`.
pub fn output_filename(original: &str, action: &str, extension: &str, date: NaiveDate) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let short: String = stem.chars().take(STEM_LIMIT).collect();
    format!("{short}_{action}_{}.{extension}", date.format("%Y-%m-%d"))
}

/// Join `candidate` onto `base` and make sure the result stays inside `base`.
///
/// Absolute candidates are accepted when they already point into `base`. `..` components are
/// resolved lexically, and when both paths exist their canonical forms are compared as well so a
/// symlink cannot lead outside.
pub fn resolve_within(base: &Path, candidate: &Path) -> Result<PathBuf> {
    let base = normalize(&std::path::absolute(base)?);
    let joined = if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&base.join(candidate))
    };

    let forbidden = || Error::Forbidden {
        message: "Access denied".to_string(),
    };

    if joined == base || !joined.starts_with(&base) {
        return Err(forbidden());
    }

    if let (Ok(real), Ok(real_base)) = (joined.canonicalize(), base.canonicalize())
        && !real.starts_with(&real_base)
    {
        return Err(forbidden());
    }

    Ok(joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Human readable size with two decimals, e.g. `1.50 KB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}

/// Filesystem facts about a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileMetadata {
    pub filename: String,
    pub size: u64,
    pub size_human: String,
    /// Extension including the leading dot, e.g. `.xlsx`
    pub extension: String,
    pub mime_type: Option<String>,
    /// RFC 3339 timestamp in local time
    pub created: String,
    /// RFC 3339 timestamp in local time
    pub modified: String,
}

pub async fn file_metadata(path: &Path) -> io::Result<FileMetadata> {
    let meta = tokio::fs::metadata(path).await?;
    let modified = meta.modified()?;
    // Not every filesystem records a birth time
    let created = meta.created().unwrap_or(modified);

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileMetadata {
        size: meta.len(),
        size_human: format_bytes(meta.len()),
        extension: extension(&filename).map(|e| format!(".{e}")).unwrap_or_default(),
        mime_type: mime_guess::from_path(path).first().map(|m| m.to_string()),
        created: timestamp(created),
        modified: timestamp(modified),
        filename,
    })
}

fn timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, false)
}
