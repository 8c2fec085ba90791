//! Static placeholder image served on every matched GET.

use base64::{Engine as _, engine::general_purpose};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs::{self, File};
use tracing::{debug, info};

/// 1x1 transparent GIF written when the placeholder file is missing.
const TRANSPARENT_GIF_B64: &str = "R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

#[derive(Debug, Clone)]
pub struct PlaceholderImage {
    path: PathBuf,
}

impl PlaceholderImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the placeholder as a transparent GIF if it does not exist.
    ///
    /// Concurrent callers may both write; they write identical bytes.
    pub async fn ensure(&self) -> io::Result<()> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }

        debug!("placeholder {} missing, creating transparent GIF", self.path.display());
        let gif = general_purpose::STANDARD
            .decode(TRANSPARENT_GIF_B64)
            .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, gif).await?;
        info!("created placeholder image at {}", self.path.display());
        Ok(())
    }

    /// Open the placeholder for streaming, creating it first if needed.
    /// Returns the file and its length.
    pub async fn open(&self) -> io::Result<(File, u64)> {
        self.ensure().await?;
        let file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Content type derived from the file extension.
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("gif") => "image/gif",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml",
            Some("ico") => "image/x-icon",
            _ => "application/octet-stream",
        }
    }
}
