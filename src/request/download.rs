// Binary attachment handling: filename negotiation and persistence through a staging file.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use tracing::debug;

use crate::config::DEFAULT_DOWNLOAD_NAME;

/// Name of the single transient file a `DirectorySink` stages into.
pub const STAGING_NAME: &str = ".attachment.part";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Bytes,
}

/// Destination for downloaded attachments.
pub trait AttachmentSink: Send + Sync {
    /// Persist the attachment, returning where it ended up.
    fn save(&self, attachment: &Attachment) -> Result<PathBuf>;
}

/// Extract `filename="<name>"` from a `content-disposition` value.
///
/// Falls back to `download.csv` when the header or the parameter is missing.
/// Only the final path component of the advertised name is kept.
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .and_then(quoted_filename)
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

fn quoted_filename(header: &str) -> Option<&str> {
    let start = header.find("filename=\"")? + "filename=\"".len();
    let rest = &header[start..];
    let end = rest.rfind('"')?;
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Saves attachments into a directory, staging through one transient file at a time.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn staging_path(&self) -> PathBuf {
        self.dir.join(STAGING_NAME)
    }
}

impl AttachmentSink for DirectorySink {
    fn save(&self, attachment: &Attachment) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let staging = self.staging_path();
        if staging.exists() {
            debug!("removing leftover staging file {}", staging.display());
            fs::remove_file(&staging)?;
        }

        fs::write(&staging, &attachment.bytes)?;
        let target = self.dir.join(&attachment.filename);
        fs::rename(&staging, &target)
            .map_err(|e| anyhow!("move {} into place: {}", attachment.filename, e))?;

        debug!(
            "saved attachment {} ({} bytes)",
            target.display(),
            attachment.bytes.len()
        );
        Ok(target)
    }
}
