//! Core data models for the upload relay.
//!
//! A `Route` is one configured upstream storage backend together with its
//! cached login token. An `UploadedFile` is the file record the upstream
//! returns from its listing and metadata endpoints.

pub mod route;
pub mod uploaded_file;
