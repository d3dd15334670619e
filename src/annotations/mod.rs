//! Bibliographic annotation module
//!
//! Annotations tag spans of a document's plain text with a bibliographic
//! role:
//!
//! - Titles and alternative titles
//! - Colophons
//! - Incipits, incipit titles and alternative incipits
//! - Person references (authors)
//!
//! The [`AnnotationStore`] keeps them for one document at a time.

mod store;
mod types;

pub use store::{AnnotationStore, Revision};
pub use types::{
    Annotation, AnnotationPatch, BibliographyType, NewAnnotation, Span, StaleAnnotation,
    UnknownType,
};
