//! HTTP handlers for the relay surface.
//!
//! - `PUT <any path>` uploads the raw body through the dispatched route and
//!   answers with the public URL as `text/plain`.
//! - `GET <any path>` streams the placeholder image when a route matches.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header},
    response::Response,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

/// Upload the request body to the route selected by the request path.
pub async fn upload_file(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let Some(dispatch) = state.relay.dispatch(uri.path()) else {
        return Err(AppError::not_found("No matching route found"));
    };
    let route = dispatch.route;
    debug!(route = route.id, path = uri.path(), "received upload");

    if body.is_empty() {
        debug!(route = route.id, "no file content received");
        return Err(AppError::bad_request("No file content received"));
    }

    let url = state.relay.upload(route, body).await.map_err(|err| {
        error!(route = route.id, error = ?err, "upload request failed");
        AppError::from(err)
    })?;

    let mut response = Response::new(Body::from(url));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Ok(response)
}

/// Serve the placeholder image for any path that dispatches to a route.
pub async fn serve_placeholder(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, AppError> {
    let Some(dispatch) = state.relay.dispatch(uri.path()) else {
        debug!(path = uri.path(), "no matching route");
        return Err(AppError::not_found("Route not found"));
    };
    debug!(route = dispatch.route.id, path = uri.path(), "serving placeholder");

    let (file, len) = state.placeholder.open().await.map_err(|err| {
        error!(path = %state.placeholder.path().display(), error = %err, "placeholder unavailable");
        AppError::internal("Internal server error")
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(state.placeholder.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}
