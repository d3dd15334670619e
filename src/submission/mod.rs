//! Submission of bibliography annotations to the catalog
//!
//! - [`convert`] maps stored annotations onto the catalog vocabulary
//! - [`CatalogApi`] posts the converted annotations with the instance

mod client;
mod vocabulary;

#[cfg(test)]
pub use client::mock;
pub use client::{CatalogApi, CreateInstance, HttpCatalogClient, InstanceCreated, SubmissionError};
pub use vocabulary::{convert, SubmissionAnnotation, UnknownVocabulary, Vocabulary};
