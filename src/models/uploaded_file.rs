//! File record returned by the upstream `fs/list` and `fs/get` endpoints.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A file as reported by the upstream storage API.
///
/// Only `name`, `path` and `sign` are interpreted by the relay. Everything else
/// the upstream sends (size, modified, raw_url, provider, ...) is kept as-is in
/// `extra` so it can be logged.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UploadedFile {
    /// File name without directory.
    #[serde(default)]
    pub name: String,

    /// Upstream-relative path, when the endpoint reports one.
    #[serde(default)]
    pub path: Option<String>,

    /// Download signature issued by the upstream.
    #[serde(default)]
    pub sign: Option<String>,

    /// Remaining metadata, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadedFile {
    /// The signature, if present and not blank.
    pub fn signature(&self) -> Option<&str> {
        self.sign.as_deref().filter(|sign| !sign.trim().is_empty())
    }
}
