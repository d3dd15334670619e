//! Bibliographic annotation types
//!
//! An annotation marks a character range of the document being catalogued
//! as a title, colophon, incipit or person reference.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Character range into a document's plain text
///
/// Offsets count Unicode scalar values, not bytes. `start <= end` always
/// holds: reversed endpoints (a selection made backwards) are swapped on
/// construction and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawSpan")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Deserialize)]
struct RawSpan {
    start: usize,
    end: usize,
}

impl From<RawSpan> for Span {
    fn from(raw: RawSpan) -> Self {
        Span::new(raw.start, raw.end)
    }
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Clamp both endpoints into `[0, len]`
    pub fn clamp_to(&self, len: usize) -> Span {
        let start = self.start.min(len);
        let end = self.end.clamp(start, len);
        Span { start, end }
    }

    /// Whether this span shares at least one character with `[from, to)`
    pub fn intersects(&self, from: usize, to: usize) -> bool {
        self.start < to && from < self.end
    }

    /// Extract the covered characters of `text`, clamped to its length
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        let start = byte_offset(text, self.start);
        let end = byte_offset(text, self.end.max(self.start));
        &text[start..end]
    }
}

/// Byte index of the `chars`-th character, or `text.len()` past the end
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Kinds of bibliographic annotation the editor can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BibliographyType {
    Title,
    AltTitle,
    Colophon,
    Incipit,
    IncipitTitle,
    AltIncipit,
    Person,
}

impl BibliographyType {
    pub const ALL: [BibliographyType; 7] = [
        BibliographyType::Title,
        BibliographyType::AltTitle,
        BibliographyType::Colophon,
        BibliographyType::Incipit,
        BibliographyType::IncipitTitle,
        BibliographyType::AltIncipit,
        BibliographyType::Person,
    ];

    /// The tag used by the editor and in CSS class names
    pub fn as_str(&self) -> &'static str {
        match self {
            BibliographyType::Title => "title",
            BibliographyType::AltTitle => "alt_title",
            BibliographyType::Colophon => "colophon",
            BibliographyType::Incipit => "incipit",
            BibliographyType::IncipitTitle => "incipit_title",
            BibliographyType::AltIncipit => "alt_incipit",
            BibliographyType::Person => "person",
        }
    }
}

impl fmt::Display for BibliographyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bibliography type: {0}")]
pub struct UnknownType(pub String);

impl FromStr for BibliographyType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BibliographyType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}

/// A stored bibliographic annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique within the owning store, never reused
    pub id: String,
    pub span: Span,
    #[serde(rename = "type")]
    pub annotation_type: BibliographyType,
    /// Text captured when the annotation was created. Not re-synced with
    /// later document edits.
    pub text: String,
    /// Creation time, monotonic within a store
    pub timestamp: DateTime<Utc>,
}

/// Input for [`AnnotationStore::add`](super::AnnotationStore::add)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub span: Span,
    #[serde(rename = "type")]
    pub annotation_type: BibliographyType,
    #[serde(default)]
    pub text: String,
}

impl NewAnnotation {
    pub fn new(span: Span, annotation_type: BibliographyType, text: impl Into<String>) -> Self {
        Self {
            span,
            annotation_type,
            text: text.into(),
        }
    }
}

/// Partial update; only the provided fields overwrite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub annotation_type: Option<BibliographyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.span.is_none() && self.annotation_type.is_none() && self.text.is_none()
    }

    /// Merge into `annotation`, returning whether anything changed
    pub(crate) fn apply(self, annotation: &mut Annotation) -> bool {
        let mut changed = false;
        if let Some(span) = self.span {
            changed |= annotation.span != span;
            annotation.span = span;
        }
        if let Some(annotation_type) = self.annotation_type {
            changed |= annotation.annotation_type != annotation_type;
            annotation.annotation_type = annotation_type;
        }
        if let Some(text) = self.text {
            changed |= annotation.text != text;
            annotation.text = text;
        }
        changed
    }
}

/// An annotation whose captured text no longer matches the live document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleAnnotation {
    pub id: String,
    pub captured: String,
    pub current: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_orders_reversed_endpoints() {
        let span = Span::new(10, 4);
        assert_eq!(span, Span { start: 4, end: 10 });

        let parsed: Span = serde_json::from_str(r#"{"start": 9, "end": 2}"#).unwrap();
        assert_eq!(parsed, Span::new(2, 9));
    }

    #[test]
    fn test_span_clamp() {
        assert_eq!(Span::new(5, 1000).clamp_to(20), Span::new(5, 20));
        assert_eq!(Span::new(25, 30).clamp_to(20), Span::new(20, 20));
        assert_eq!(Span::new(5, 10).clamp_to(20), Span::new(5, 10));
    }

    #[test]
    fn test_span_slice_counts_chars() {
        let text = "བཀྲ་ཤིས་ bde legs";
        let span = Span::new(0, 3);
        assert_eq!(span.slice(text), "བཀྲ");
        assert_eq!(Span::new(10, 100).slice("short"), "");
        assert_eq!(Span::new(1, 100).slice("short"), "hort");
    }

    #[test]
    fn test_type_round_trip_through_str() {
        for t in BibliographyType::ALL {
            assert_eq!(t.as_str().parse::<BibliographyType>().unwrap(), t);
        }
        assert!("citation".parse::<BibliographyType>().is_err());
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&BibliographyType::IncipitTitle).unwrap();
        assert_eq!(json, "\"incipit_title\"");
    }

    #[test]
    fn test_patch_reports_changes() {
        let mut annotation = Annotation {
            id: "a".to_string(),
            span: Span::new(0, 4),
            annotation_type: BibliographyType::Title,
            text: "Abcd".to_string(),
            timestamp: Utc::now(),
        };

        let unchanged = AnnotationPatch {
            annotation_type: Some(BibliographyType::Title),
            ..Default::default()
        };
        assert!(!unchanged.apply(&mut annotation));

        let patch = AnnotationPatch {
            span: Some(Span::new(1, 3)),
            ..Default::default()
        };
        assert!(patch.apply(&mut annotation));
        assert_eq!(annotation.span, Span::new(1, 3));
        assert_eq!(annotation.text, "Abcd");
    }
}
