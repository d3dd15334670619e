//! Cataloger Server Library
//!
//! Editing-session backend for the bibliographic annotation of structured
//! literary texts. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `annotations`: span annotations and the per-document store
//! - `decorations`: projection of annotations onto editor decorations
//! - `submission`: vocabulary conversion and the catalog client
//! - `search`: debounced BDRC lookup
//! - `suggest`: AI title/author suggestions
//! - `sync`: alternative-title reconciliation
//! - `session`: editing sessions binding a document to its store

pub mod annotations;
pub mod config;
pub mod decorations;
pub mod error;
pub mod routes;
pub mod search;
pub mod session;
pub mod state;
pub mod submission;
pub mod suggest;
pub mod sync;
