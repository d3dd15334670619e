//! Mapping from editor annotation types to the catalog's vocabulary
//!
//! The editor distinguishes more kinds of span than the catalog persists as
//! bibliography annotations. Conversion drops what the target vocabulary
//! cannot express instead of failing.

use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::annotations::{Annotation, BibliographyType, Span};

/// Accepted submission vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    /// Incipit family dropped, `person` renamed to `author`, field `type`
    #[default]
    Author,
    /// Every tag kept verbatim under field `biblography_type`
    Passthrough,
}

impl Vocabulary {
    /// External name for `annotation_type`, or `None` when it is not accepted
    pub fn external_type(&self, annotation_type: BibliographyType) -> Option<&'static str> {
        match self {
            Vocabulary::Author => match annotation_type {
                BibliographyType::Title => Some("title"),
                BibliographyType::AltTitle => Some("alt_title"),
                BibliographyType::Colophon => Some("colophon"),
                BibliographyType::Person => Some("author"),
                BibliographyType::Incipit
                | BibliographyType::IncipitTitle
                | BibliographyType::AltIncipit => None,
            },
            Vocabulary::Passthrough => Some(annotation_type.as_str()),
        }
    }

    /// Name of the field carrying the external type
    pub fn type_field(&self) -> &'static str {
        match self {
            Vocabulary::Author => "type",
            Vocabulary::Passthrough => "biblography_type",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vocabulary::Author => "author",
            Vocabulary::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bibliography vocabulary: {0} (expected 'author' or 'passthrough')")]
pub struct UnknownVocabulary(pub String);

impl FromStr for Vocabulary {
    type Err = UnknownVocabulary;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Vocabulary::Author),
            "passthrough" | "legacy" => Ok(Vocabulary::Passthrough),
            other => Err(UnknownVocabulary(other.to_string())),
        }
    }
}

/// One annotation in the catalog's vocabulary
///
/// Serializes as `{"span": {...}, "<type field>": "<external type>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionAnnotation {
    pub span: Span,
    pub external_type: &'static str,
    type_field: &'static str,
}

impl SubmissionAnnotation {
    pub fn type_field(&self) -> &'static str {
        self.type_field
    }
}

impl Serialize for SubmissionAnnotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("span", &self.span)?;
        map.serialize_entry(self.type_field, self.external_type)?;
        map.end()
    }
}

/// Convert annotations to `vocabulary`, dropping unmapped types
///
/// Output order follows input order.
pub fn convert<'a, I>(annotations: I, vocabulary: Vocabulary) -> Vec<SubmissionAnnotation>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    annotations
        .into_iter()
        .filter_map(|annotation| {
            vocabulary
                .external_type(annotation.annotation_type)
                .map(|external_type| SubmissionAnnotation {
                    span: annotation.span,
                    external_type,
                    type_field: vocabulary.type_field(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{AnnotationStore, NewAnnotation};

    fn store_with(types: &[BibliographyType]) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        for (i, &t) in types.iter().enumerate() {
            store.add(NewAnnotation::new(Span::new(i * 10, i * 10 + 5), t, ""));
        }
        store
    }

    #[test]
    fn test_title_round_trip() {
        let mut store = AnnotationStore::new();
        store.add(NewAnnotation::new(
            Span::new(0, 4),
            BibliographyType::Title,
            "Abc",
        ));

        let titles = store.list_by_type(BibliographyType::Title);
        let converted = convert(&titles, Vocabulary::Author);

        assert_eq!(converted.len(), 1);
        assert_eq!(
            Some(converted[0].external_type),
            Vocabulary::Author.external_type(BibliographyType::Title)
        );
        assert_eq!(converted[0].span, Span::new(0, 4));
    }

    #[test]
    fn test_author_vocabulary_drops_incipits() {
        let store = store_with(&BibliographyType::ALL);
        let converted = convert(store.iter(), Vocabulary::Author);

        let types: Vec<&str> = converted.iter().map(|c| c.external_type).collect();
        assert_eq!(types, vec!["title", "alt_title", "colophon", "author"]);
    }

    #[test]
    fn test_passthrough_keeps_everything_in_order() {
        let store = store_with(&[
            BibliographyType::Person,
            BibliographyType::Incipit,
            BibliographyType::Title,
        ]);
        let converted = convert(store.iter(), Vocabulary::Passthrough);

        let types: Vec<&str> = converted.iter().map(|c| c.external_type).collect();
        assert_eq!(types, vec!["person", "incipit", "title"]);
        assert_eq!(converted[1].span, Span::new(10, 15));
    }

    #[test]
    fn test_convert_is_deterministic() {
        let store = store_with(&BibliographyType::ALL);
        assert_eq!(
            convert(store.iter(), Vocabulary::Author),
            convert(store.iter(), Vocabulary::Author)
        );
    }

    #[test]
    fn test_serialized_field_name() {
        let store = store_with(&[BibliographyType::Person]);

        let author = serde_json::to_value(convert(store.iter(), Vocabulary::Author)).unwrap();
        assert_eq!(
            author,
            serde_json::json!([{"span": {"start": 0, "end": 5}, "type": "author"}])
        );

        let legacy = serde_json::to_value(convert(store.iter(), Vocabulary::Passthrough)).unwrap();
        assert_eq!(legacy[0]["biblography_type"], "person");
    }

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!("Author".parse::<Vocabulary>().unwrap(), Vocabulary::Author);
        assert_eq!("legacy".parse::<Vocabulary>().unwrap(), Vocabulary::Passthrough);
        assert!("bibtex".parse::<Vocabulary>().is_err());
    }
}
