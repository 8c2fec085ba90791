//! src/services/alist_client.rs
//!
//! AlistClient: the four upstream calls the relay needs (login, list, get,
//! put) against an AList-style storage API. Every call is scoped to a
//! `Route`; list/get/put first obtain a token through the route's
//! `TokenCache`, which logs in lazily.
//!
//! The upstream wraps every response in `{code, message, data}` and signals
//! success with `code == 200`, independent of the HTTP status.

use crate::models::{route::Route, uploaded_file::UploadedFile};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{
    Response,
    header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

pub const LOGIN_ENDPOINT: &str = "/api/auth/login";
pub const LIST_ENDPOINT: &str = "/api/fs/list";
pub const GET_ENDPOINT: &str = "/api/fs/get";
pub const PUT_ENDPOINT: &str = "/api/fs/put";

/// Header carrying the percent-encoded destination of a `fs/put`.
pub const FILE_PATH_HEADER: &str = "File-Path";

const SUCCESS_CODE: i64 = 200;

/// Characters `encodeURIComponent` leaves alone: alphanumerics and `-_.!~*'()`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single URI component (path header, query value).
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a readable response.
    #[error("route {route}: {endpoint} transport error: {source}")]
    Transport {
        route: u32,
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The upstream answered, but not with success.
    #[error("route {route}: {endpoint} rejected with code {code}: {message}")]
    Rejected {
        route: u32,
        endpoint: &'static str,
        code: i64,
        message: String,
    },
    /// The response body was not the expected envelope.
    #[error("route {route}: {endpoint} returned a malformed body: {source}")]
    Malformed {
        route: u32,
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A successful response was missing the field the caller needs.
    #[error("route {route}: {endpoint} response has no {field}")]
    MissingField {
        route: u32,
        endpoint: &'static str,
        field: &'static str,
    },
    /// Obtaining a token failed before the actual call could be made.
    #[error("route {route}: login failed: {source}")]
    Auth {
        route: u32,
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Auth { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct LoginReq<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    token: String,
}

/// Body shared by `fs/list` and `fs/get`.
#[derive(Debug, Serialize)]
struct FsReq<'a> {
    path: &'a str,
    password: &'a str,
    page: u32,
    per_page: u32,
    refresh: bool,
}

#[derive(Debug, Deserialize)]
struct ListData {
    content: Option<Vec<UploadedFile>>,
}

/// HTTP client for the upstream storage API.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Clone, Debug)]
pub struct AlistClient {
    http: reqwest::Client,
    list_per_page: u32,
}

impl AlistClient {
    /// Build a client. `timeout` bounds each upstream request; `None` keeps
    /// reqwest's default. `list_per_page` must cover the whole upload directory.
    pub fn new(timeout: Option<Duration>, list_per_page: u32) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            list_per_page,
        })
    }

    /// Exchange credentials for a token.
    pub async fn login(
        &self,
        route: &Route,
        username: &str,
        password: &str,
    ) -> BackendResult<String> {
        debug!(
            route = route.id,
            "requesting new token from {}{}", route.api_url, LOGIN_ENDPOINT
        );

        let resp = self
            .http
            .post(format!("{}{}", route.api_url, LOGIN_ENDPOINT))
            .json(&LoginReq { username, password })
            .send()
            .await
            .map_err(|source| transport(route, LOGIN_ENDPOINT, source))?;

        let data: Option<LoginData> = read_envelope(route, LOGIN_ENDPOINT, resp).await?;
        match data {
            Some(LoginData { token }) if !token.is_empty() => Ok(token),
            _ => Err(BackendError::MissingField {
                route: route.id,
                endpoint: LOGIN_ENDPOINT,
                field: "token",
            }),
        }
    }

    /// A valid token for `route`, logging in when the cached one has expired.
    pub async fn token(&self, route: &Route) -> BackendResult<String> {
        let token = route
            .token
            .get_or_refresh(|| self.login(route, &route.username, &route.password))
            .await
            .map_err(|err| BackendError::Auth {
                route: route.id,
                source: Box::new(err),
            })?;

        if let Some(expires_at) = route.token.expires_at().await {
            trace!(route = route.id, %expires_at, "using token");
        }
        Ok(token)
    }

    /// List `dir`, forcing the upstream to refresh its directory cache.
    pub async fn list_directory(
        &self,
        route: &Route,
        dir: &str,
    ) -> BackendResult<Vec<UploadedFile>> {
        let token = self.token(route).await?;
        debug!(route = route.id, dir, "listing directory");

        let body = FsReq {
            path: dir,
            password: "",
            page: 1,
            per_page: self.list_per_page,
            refresh: true,
        };
        let data: Option<ListData> = self.post_fs(route, LIST_ENDPOINT, &token, &body).await?;

        data.and_then(|d| d.content).ok_or(BackendError::MissingField {
            route: route.id,
            endpoint: LIST_ENDPOINT,
            field: "content",
        })
    }

    /// Fetch one file's metadata, bypassing the upstream cache.
    pub async fn get_file_info(&self, route: &Route, path: &str) -> BackendResult<UploadedFile> {
        let token = self.token(route).await?;
        debug!(route = route.id, path, "fetching file info");

        let body = FsReq {
            path,
            password: "",
            page: 1,
            per_page: 0,
            refresh: true,
        };
        let data: Option<UploadedFile> = self.post_fs(route, GET_ENDPOINT, &token, &body).await?;

        data.ok_or(BackendError::MissingField {
            route: route.id,
            endpoint: GET_ENDPOINT,
            field: "data",
        })
    }

    /// Write `bytes` to `path` on the upstream.
    pub async fn put_file(&self, route: &Route, path: &str, bytes: Bytes) -> BackendResult<()> {
        let token = self.token(route).await?;
        let encoded_path = encode_component(path);
        debug!(
            route = route.id,
            path,
            %encoded_path,
            size = bytes.len(),
            "uploading to {}{}",
            route.api_url,
            PUT_ENDPOINT
        );

        let resp = self
            .http
            .put(format!("{}{}", route.api_url, PUT_ENDPOINT))
            .header(AUTHORIZATION, token)
            .header(FILE_PATH_HEADER, encoded_path)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, bytes.len().to_string())
            .body(bytes)
            .send()
            .await
            .map_err(|source| transport(route, PUT_ENDPOINT, source))?;

        let _: Option<serde_json::Value> = read_envelope(route, PUT_ENDPOINT, resp).await?;
        Ok(())
    }

    async fn post_fs<T: DeserializeOwned>(
        &self,
        route: &Route,
        endpoint: &'static str,
        token: &str,
        body: &FsReq<'_>,
    ) -> BackendResult<Option<T>> {
        trace!(route = route.id, endpoint, request = ?body, "upstream request");
        let resp = self
            .http
            .post(format!("{}{}", route.api_url, endpoint))
            .header(AUTHORIZATION, token)
            .json(body)
            .send()
            .await
            .map_err(|source| transport(route, endpoint, source))?;

        read_envelope(route, endpoint, resp).await
    }
}

fn transport(route: &Route, endpoint: &'static str, source: reqwest::Error) -> BackendError {
    BackendError::Transport {
        route: route.id,
        endpoint,
        source,
    }
}

/// Read a `{code, message, data}` envelope and return `data` on `code == 200`.
async fn read_envelope<T: DeserializeOwned>(
    route: &Route,
    endpoint: &'static str,
    resp: Response,
) -> BackendResult<Option<T>> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|source| transport(route, endpoint, source))?;
    trace!(route = route.id, endpoint, %status, payload = %text, "upstream response");

    if !status.is_success() {
        return Err(BackendError::Rejected {
            route: route.id,
            endpoint,
            code: i64::from(status.as_u16()),
            message: text,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&text).map_err(|source| BackendError::Malformed {
            route: route.id,
            endpoint,
            source,
        })?;

    if envelope.code != SUCCESS_CODE {
        return Err(BackendError::Rejected {
            route: route.id,
            endpoint,
            code: envelope.code,
            message: envelope.message,
        });
    }

    Ok(envelope.data)
}
