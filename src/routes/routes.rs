//! Defines the relay's HTTP surface.
//!
//! ## Structure
//! - `PUT /{*path}`: upload the body through the dispatched route
//! - `GET /{*path}`: placeholder image (HEAD is answered by the same handler)
//!
//! Both are also mounted at `/` since the wildcard needs at least one segment.
//! The first path segment selects the route; see `RouteRegistry::dispatch`.

use crate::{
    handlers::relay_handlers::{serve_placeholder, upload_file},
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Request,
    routing::{MethodRouter, put},
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

/// Build the router. Request bodies above `max_upload_bytes` are rejected
/// with 413 before reaching the upload handler.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", relay())
        .route("/{*path}", relay())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn relay() -> MethodRouter<AppState> {
    put(upload_file).get(serve_placeholder)
}
