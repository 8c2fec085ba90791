//! Shared state handed to every handler.

use crate::services::{placeholder::PlaceholderImage, relay_service::RelayService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayService,
    pub placeholder: Arc<PlaceholderImage>,
}
