pub mod relay_handlers;
