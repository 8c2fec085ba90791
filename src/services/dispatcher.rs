//! Route registry and request-path dispatch.

use crate::models::route::{Route, RouteConfig};

/// The route selected for a request and the path left after dispatch.
#[derive(Debug)]
pub struct Dispatch<'a> {
    pub route: &'a Route,
    pub remaining_path: String,
}

/// All configured routes, in configuration order.
#[derive(Debug)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    /// Build routes from configuration, assigning ids 1, 2, 3, ... in order.
    pub fn new(configs: Vec<RouteConfig>) -> Self {
        let routes = configs
            .into_iter()
            .zip(1u32..)
            .map(|(cfg, id)| Route::new(id, cfg))
            .collect();
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The first route without a suffix.
    pub fn default_route(&self) -> Option<&Route> {
        self.routes.iter().find(|r| r.is_default())
    }

    /// Select the route for `path`.
    ///
    /// A route whose suffix equals the first path segment wins (first in
    /// configuration order), and that segment is stripped from the path.
    /// Otherwise the default route gets the path unchanged. Without a default
    /// route, unmatched paths are rejected.
    pub fn dispatch(&self, path: &str) -> Option<Dispatch<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(first) = segments.first() {
            let matched = self
                .routes
                .iter()
                .find(|r| !r.is_default() && r.suffix == *first);
            if let Some(route) = matched {
                tracing::debug!(route = route.id, suffix = %route.suffix, "matched route");
                return Some(Dispatch {
                    route,
                    remaining_path: format!("/{}", segments[1..].join("/")),
                });
            }
        }

        let route = self.default_route()?;
        tracing::debug!(route = route.id, "using default route");
        Some(Dispatch {
            route,
            remaining_path: path.to_string(),
        })
    }
}
