pub mod alist_client;
pub mod dispatcher;
pub mod placeholder;
pub mod relay_service;
pub mod token_cache;
