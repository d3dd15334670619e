//! Projection of annotations onto editor decorations
//!
//! The projection is defensive: annotations may reference offsets past the
//! end of the live document (the text shrank after they were created), and
//! a bad style entry must not take the whole editor down. Such annotations
//! are clamped or skipped, never reported as a failure.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use lru::LruCache;
use serde::Serialize;

use super::style::{is_hex_color, ColorPair, StyleTable};
use crate::annotations::{Annotation, AnnotationStore, BibliographyType, Revision};

/// Default number of cached projections per projector
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Attributes carried by a decoration for hit-testing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecorationAttributes {
    pub annotation_id: String,
    #[serde(rename = "type")]
    pub annotation_type: BibliographyType,
    pub label: String,
}

/// A renderer-level mark over `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub start: usize,
    pub end: usize,
    pub class: String,
    pub colors: ColorPair,
    pub attributes: DecorationAttributes,
}

/// Decorations sorted by ascending start offset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Decoration> {
        self.decorations.iter()
    }

    pub fn as_slice(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    /// Decorations covering character `offset`, e.g. for click-to-select
    pub fn at(&self, offset: usize) -> impl Iterator<Item = &Decoration> {
        self.decorations
            .iter()
            .take_while(move |d| d.start <= offset)
            .filter(move |d| offset < d.end)
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

/// Why a single annotation produced no decoration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("no style registered for {0} and no title fallback")]
    MissingStyle(BibliographyType),

    #[error("invalid colour {color:?} in style for {annotation_type}")]
    InvalidColor {
        annotation_type: BibliographyType,
        color: String,
    },
}

/// Project `annotations` onto a document of `document_len` characters
///
/// Spans are clamped to the document; only spans that are still non-empty
/// after clamping are rendered. When `viewport` is given, decorations that
/// do not intersect it are omitted.
pub fn project(
    annotations: &[Annotation],
    document_len: usize,
    styles: &StyleTable,
    viewport: Option<Range<usize>>,
) -> DecorationSet {
    let mut decorations: Vec<Decoration> = annotations
        .iter()
        .filter_map(|annotation| {
            let span = annotation.span.clamp_to(document_len);
            if span.is_empty() {
                return None;
            }
            if let Some(ref view) = viewport {
                if !span.intersects(view.start, view.end) {
                    return None;
                }
            }

            match build_decoration(annotation, span.start, span.end, styles) {
                Ok(decoration) => Some(decoration),
                Err(e) => {
                    tracing::warn!(
                        annotation_id = %annotation.id,
                        "Skipping decoration: {}",
                        e
                    );
                    None
                }
            }
        })
        .collect();

    // Stable sort keeps insertion order among identical ranges
    decorations.sort_by_key(|d| (d.start, d.end));

    DecorationSet { decorations }
}

fn build_decoration(
    annotation: &Annotation,
    start: usize,
    end: usize,
    styles: &StyleTable,
) -> Result<Decoration, ProjectionError> {
    let annotation_type = annotation.annotation_type;
    let style = styles
        .lookup(annotation_type)
        .ok_or(ProjectionError::MissingStyle(annotation_type))?;

    for color in [&style.colors.background, &style.colors.foreground] {
        if !is_hex_color(color) {
            return Err(ProjectionError::InvalidColor {
                annotation_type,
                color: color.clone(),
            });
        }
    }

    Ok(Decoration {
        start,
        end,
        class: styles.class_for(annotation_type),
        colors: style.colors.clone(),
        attributes: DecorationAttributes {
            annotation_id: annotation.id.clone(),
            annotation_type,
            label: style.label.clone(),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProjectionKey {
    revision: Revision,
    document_len: usize,
    viewport: Option<(usize, usize)>,
}

/// Memoizing projector bound to one style table
///
/// A projection is recomputed only when the store revision, the document
/// length or the viewport differs from a cached one.
pub struct Projector {
    styles: Arc<StyleTable>,
    cache: LruCache<ProjectionKey, Arc<DecorationSet>>,
    computed: u64,
}

impl Projector {
    pub fn new(styles: Arc<StyleTable>) -> Self {
        Self::with_capacity(styles, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(styles: Arc<StyleTable>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            styles,
            cache: LruCache::new(capacity),
            computed: 0,
        }
    }

    pub fn styles(&self) -> &Arc<StyleTable> {
        &self.styles
    }

    /// Decorations for the current state of `store`
    pub fn decorations(
        &mut self,
        store: &AnnotationStore,
        document_len: usize,
        viewport: Option<Range<usize>>,
    ) -> Arc<DecorationSet> {
        let key = ProjectionKey {
            revision: store.revision(),
            document_len,
            viewport: viewport.as_ref().map(|v| (v.start, v.end)),
        };

        if let Some(hit) = self.cache.get(&key) {
            return Arc::clone(hit);
        }

        let set = Arc::new(project(
            store.as_slice(),
            document_len,
            &self.styles,
            viewport,
        ));
        self.computed += 1;
        tracing::debug!(
            version = key.revision.version,
            document_len,
            decorations = set.len(),
            "Recomputed decorations"
        );
        self.cache.put(key, Arc::clone(&set));
        set
    }

    /// Number of projections computed (cache misses) so far
    pub fn computed(&self) -> u64 {
        self.computed
    }
}
