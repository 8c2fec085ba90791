use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use services::{
    alist_client::AlistClient,
    dispatcher::RouteRegistry,
    placeholder::PlaceholderImage,
    relay_service::{ConfirmTiming, RelayService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    let default_filter = format!(
        "{krate}={level},tower_http={level}",
        krate = env!("CARGO_CRATE_NAME"),
        level = cfg.log_level()
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("Starting upload-relay with config: {:?}", cfg);

    // --- Placeholder image ---
    let placeholder = PlaceholderImage::new(&cfg.placeholder_path);
    if let Err(err) = placeholder.ensure().await {
        tracing::warn!(
            "Could not prepare placeholder {}: {}",
            placeholder.path().display(),
            err
        );
    }

    // --- Initialize core service ---
    let client = AlistClient::new(cfg.upstream_timeout, cfg.list_per_page)?;
    let relay = RelayService::new(
        RouteRegistry::new(cfg.routes.clone()),
        client,
        ConfirmTiming {
            initial_wait: cfg.initial_wait,
            retry_wait: cfg.retry_wait,
        },
    );
    log_routes(&cfg, relay.registry());

    let state = state::AppState {
        relay,
        placeholder: Arc::new(placeholder),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Print where each route is reachable and what it forwards to.
fn log_routes(cfg: &config::AppConfig, registry: &RouteRegistry) {
    tracing::info!("Configured {} route(s)", registry.routes().len());
    for route in registry.routes() {
        let public = if route.suffix.is_empty() {
            format!("http://localhost:{}", cfg.port)
        } else {
            format!("http://localhost:{}/{}", cfg.port, route.suffix)
        };
        let absolute = if route.absolute_path.is_empty() {
            "(none)"
        } else {
            route.absolute_path.as_str()
        };
        tracing::info!(
            route = route.id,
            api_url = %route.api_url,
            upload_path = %route.upload_path,
            absolute_path = absolute,
            "route {} available at {}",
            route.id,
            public
        );
    }
    if registry.default_route().is_none() {
        tracing::warn!("No default route configured; requests without a known suffix get 404");
    }

    let debug_mode = match (cfg.debug, cfg.verbose) {
        (true, true) => "enabled (verbose)",
        (true, false) => "enabled",
        _ => "disabled",
    };
    tracing::info!(
        "Debug mode: {}. Initial wait: {:?}, retry wait: {:?}",
        debug_mode,
        cfg.initial_wait,
        cfg.retry_wait
    );
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping server");
}
