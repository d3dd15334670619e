//! Editor decorations
//!
//! Maps the annotation set of a document onto marks a text widget can
//! paint, and optionally onto HTML markup for previews.
//!
//! # Pipeline
//!
//! 1. Clamp each span to the live document length
//! 2. Drop spans that are empty after clamping
//! 3. Attach the per-type style from a [`StyleTable`]
//! 4. Sort by start offset
//!
//! [`Projector`] memoizes the result per store revision.

mod markup;
mod projector;
mod style;

pub use markup::{render_markup, MarkupConfig};
pub use projector::{
    project, Decoration, DecorationAttributes, DecorationSet, ProjectionError, Projector,
    DEFAULT_CACHE_CAPACITY,
};
pub use style::{ColorPair, StyleTable, TypeStyle};
