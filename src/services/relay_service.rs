//! src/services/relay_service.rs
//!
//! RelayService: pushes an inbound upload to the selected route and turns the
//! result into a public download URL.
//!
//! After a successful `fs/put` the upstream may still serve stale directory
//! and metadata caches. Confirmation therefore runs in two timed phases:
//! wait `initial_wait`, list the parent directory with a forced refresh, and
//! only if the new file shows up wait `retry_wait` and fetch its metadata
//! (which carries the download signature). Any confirmation failure degrades
//! to an unsigned URL; only a failed login or a failed put is an error.

use crate::{
    models::{route::Route, uploaded_file::UploadedFile},
    services::{
        alist_client::{AlistClient, BackendError, encode_component},
        dispatcher::{Dispatch, RouteRegistry},
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extension given to every relayed upload.
pub const UPLOAD_EXTENSION: &str = "gif";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authentication with upstream failed")]
    Auth(#[source] BackendError),
    #[error("Upload failed")]
    Upload(#[source] BackendError),
}

impl From<BackendError> for RelayError {
    fn from(err: BackendError) -> Self {
        if err.is_auth() {
            RelayError::Auth(err)
        } else {
            RelayError::Upload(err)
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Delays around upload confirmation, calibrated to the upstream's cache
/// invalidation latency.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmTiming {
    /// Pause between the put and the directory listing.
    pub initial_wait: Duration,
    /// Pause between the listing and the metadata fetch.
    pub retry_wait: Duration,
}

/// Outcome of the confirmation phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// The file was seen; carries the best record obtained.
    Confirmed(UploadedFile),
    /// The file could not be confirmed; the URL is built without a signature.
    Unconfirmed,
}

/// Shared relay state: routes, upstream client and confirmation timing.
#[derive(Clone)]
pub struct RelayService {
    registry: Arc<RouteRegistry>,
    client: AlistClient,
    timing: ConfirmTiming,
}

impl RelayService {
    pub fn new(registry: RouteRegistry, client: AlistClient, timing: ConfirmTiming) -> Self {
        Self {
            registry: Arc::new(registry),
            client,
            timing,
        }
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn dispatch(&self, path: &str) -> Option<Dispatch<'_>> {
        self.registry.dispatch(path)
    }

    /// Upload `bytes` to `route` and return the public URL of the new file.
    pub async fn upload(&self, route: &Route, bytes: Bytes) -> RelayResult<String> {
        let filename = generate_filename(Utc::now());
        let file_path = format!("{}{}", route.upload_path, filename);
        debug!(route = route.id, %filename, %file_path, size = bytes.len(), "relaying upload");

        self.client
            .put_file(route, &file_path, bytes)
            .await
            .inspect_err(|err| warn!(route = route.id, error = %err, "upload rejected"))?;
        info!(route = route.id, %file_path, "file uploaded");

        debug!(route = route.id, "waiting {:?} before confirming", self.timing.initial_wait);
        tokio::time::sleep(self.timing.initial_wait).await;

        let url = match self.confirm(route, &file_path, &filename).await {
            Confirmation::Confirmed(record) => build_file_url(route, &file_path, Some(&record)),
            Confirmation::Unconfirmed => {
                warn!(route = route.id, %file_path, "upload unconfirmed, returning unsigned URL");
                build_file_url(route, &file_path, None)
            }
        };
        info!(route = route.id, %url, "file URL");
        Ok(url)
    }

    /// Refresh the parent listing, then fetch metadata for `file_path`.
    async fn confirm(&self, route: &Route, file_path: &str, filename: &str) -> Confirmation {
        let dir = parent_dir(file_path);

        let listing = match self.client.list_directory(route, dir).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(route = route.id, dir, error = %err, "directory listing failed");
                return Confirmation::Unconfirmed;
            }
        };

        let Some(listed) = listing.into_iter().find(|f| f.name == filename) else {
            debug!(route = route.id, dir, filename, "uploaded file not in listing yet");
            return Confirmation::Unconfirmed;
        };
        debug!(route = route.id, record = ?listed, "found file in listing");

        debug!(route = route.id, "waiting {:?} before file info", self.timing.retry_wait);
        tokio::time::sleep(self.timing.retry_wait).await;

        match self.client.get_file_info(route, file_path).await {
            Ok(info) => {
                debug!(route = route.id, path = ?info.path, record = ?info, "fetched file info");
                Confirmation::Confirmed(info)
            }
            Err(err) => {
                warn!(route = route.id, error = %err, "file info failed, using listing record");
                Confirmation::Confirmed(listed)
            }
        }
    }
}

/// `upload_<unix millis>_<6 random chars>.gif`
pub fn generate_filename(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "upload_{}_{}.{}",
        now.timestamp_millis(),
        &random[..6],
        UPLOAD_EXTENSION
    )
}

/// Directory containing `path`, without a trailing slash (root stays `/`).
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// `api_url + "/d" + public path`, with `?sign=` when the record carries a
/// non-blank signature.
pub fn build_file_url(route: &Route, file_path: &str, record: Option<&UploadedFile>) -> String {
    let mut url = format!("{}/d{}", route.api_url, route.public_path(file_path));
    if let Some(sign) = record.and_then(UploadedFile::signature) {
        url.push_str("?sign=");
        url.push_str(&encode_component(sign));
    }
    url
}
