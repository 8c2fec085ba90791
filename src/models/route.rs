//! Represents one configured upstream backend ("route").

use crate::services::token_cache::TokenCache;
use std::fmt;

/// Route settings as read from configuration, before an id is assigned.
#[derive(Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Base URL of the upstream storage API.
    pub api_url: String,

    /// First request path segment selecting this route. Empty for the default route.
    pub suffix: String,

    pub username: String,
    pub password: String,

    /// Upstream directory new uploads are written to.
    pub upload_path: String,

    /// Prefix prepended to upstream paths in public download URLs.
    pub absolute_path: String,
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("api_url", &self.api_url)
            .field("suffix", &self.suffix)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("upload_path", &self.upload_path)
            .field("absolute_path", &self.absolute_path)
            .finish()
    }
}

/// A live route: normalized settings plus the cached login token.
///
/// Routes are built once at startup and never change, except for the token
/// held in `token`, which only the token cache refresh path writes.
pub struct Route {
    /// 1-based position in configuration order.
    pub id: u32,

    /// API base URL without a trailing slash.
    pub api_url: String,

    pub suffix: String,
    pub username: String,
    pub password: String,

    /// Always starts and ends with `/`.
    pub upload_path: String,

    /// Empty, or a prefix without a trailing slash.
    pub absolute_path: String,

    pub(crate) token: TokenCache,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("api_url", &self.api_url)
            .field("suffix", &self.suffix)
            .field("upload_path", &self.upload_path)
            .field("absolute_path", &self.absolute_path)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new(id: u32, cfg: RouteConfig) -> Self {
        Self {
            id,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            suffix: cfg.suffix.trim_matches('/').to_string(),
            username: cfg.username,
            password: cfg.password,
            upload_path: normalize_dir(&cfg.upload_path),
            absolute_path: cfg.absolute_path.trim_end_matches('/').to_string(),
            token: TokenCache::default(),
        }
    }

    /// Whether this route is selected when no suffix matches.
    pub fn is_default(&self) -> bool {
        self.suffix.is_empty()
    }

    /// Path as exposed by the public download endpoint.
    pub fn public_path(&self, path: &str) -> String {
        if self.absolute_path.is_empty() {
            path.to_string()
        } else {
            format!("{}{}", self.absolute_path, path)
        }
    }
}

/// Turn `up`, `/up` or `/up/` into `/up/`.
fn normalize_dir(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
