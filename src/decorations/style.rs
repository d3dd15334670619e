//! Per-type visual metadata for decorations

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::annotations::BibliographyType;

/// Background/foreground colour pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub background: String,
    pub foreground: String,
}

impl ColorPair {
    pub fn new(background: impl Into<String>, foreground: impl Into<String>) -> Self {
        Self {
            background: background.into(),
            foreground: foreground.into(),
        }
    }
}

/// Visual metadata for one annotation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStyle {
    pub colors: ColorPair,
    /// Human-readable label shown next to the mark
    pub label: String,
}

impl TypeStyle {
    pub fn new(background: &str, foreground: &str, label: &str) -> Self {
        Self {
            colors: ColorPair::new(background, foreground),
            label: label.to_string(),
        }
    }
}

/// Immutable style configuration handed to the projector
///
/// Types without an entry fall back to the style registered for
/// [`BibliographyType::Title`].
#[derive(Debug, Clone)]
pub struct StyleTable {
    class_prefix: String,
    styles: HashMap<BibliographyType, TypeStyle>,
}

impl Default for StyleTable {
    fn default() -> Self {
        let styles = [
            (BibliographyType::Title, TypeStyle::new("#dbeafe", "#1e40af", "Title")),
            (BibliographyType::AltTitle, TypeStyle::new("#e0e7ff", "#3730a3", "Alt Title")),
            (BibliographyType::Colophon, TypeStyle::new("#fef3c7", "#92400e", "Colophon")),
            (BibliographyType::Incipit, TypeStyle::new("#dcfce7", "#166534", "Incipit")),
            (
                BibliographyType::IncipitTitle,
                TypeStyle::new("#d1fae5", "#065f46", "Incipit Title"),
            ),
            (
                BibliographyType::AltIncipit,
                TypeStyle::new("#ecfccb", "#3f6212", "Alt Incipit"),
            ),
            (BibliographyType::Person, TypeStyle::new("#fce7f3", "#9d174d", "Person")),
        ];

        Self {
            class_prefix: "bib-annotation".to_string(),
            styles: styles.into_iter().collect(),
        }
    }
}

impl StyleTable {
    /// An empty table; every lookup fails until styles are added
    pub fn empty(class_prefix: impl Into<String>) -> Self {
        Self {
            class_prefix: class_prefix.into(),
            styles: HashMap::new(),
        }
    }

    pub fn with_style(mut self, annotation_type: BibliographyType, style: TypeStyle) -> Self {
        self.styles.insert(annotation_type, style);
        self
    }

    pub fn class_prefix(&self) -> &str {
        &self.class_prefix
    }

    /// Style for `annotation_type`, falling back to the title style
    pub fn lookup(&self, annotation_type: BibliographyType) -> Option<&TypeStyle> {
        self.styles
            .get(&annotation_type)
            .or_else(|| self.styles.get(&BibliographyType::Title))
    }

    /// CSS class list for a decoration of `annotation_type`
    pub fn class_for(&self, annotation_type: BibliographyType) -> String {
        format!(
            "{prefix} {prefix}-{}",
            annotation_type.as_str().replace('_', "-"),
            prefix = self.class_prefix
        )
    }
}

/// Whether `value` is a CSS hex colour (`#rgb`, `#rrggbb` or `#rrggbbaa`)
pub(crate) fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_type() {
        let table = StyleTable::default();
        for t in BibliographyType::ALL {
            let style = table.lookup(t).unwrap();
            assert!(is_hex_color(&style.colors.background));
            assert!(is_hex_color(&style.colors.foreground));
        }
    }

    #[test]
    fn test_lookup_falls_back_to_title() {
        let table = StyleTable::empty("x")
            .with_style(BibliographyType::Title, TypeStyle::new("#fff", "#000", "Title"));

        let style = table.lookup(BibliographyType::Colophon).unwrap();
        assert_eq!(style.label, "Title");
        assert!(StyleTable::empty("x").lookup(BibliographyType::Title).is_none());
    }

    #[test]
    fn test_class_encodes_type() {
        let table = StyleTable::default();
        assert_eq!(
            table.class_for(BibliographyType::AltIncipit),
            "bib-annotation bib-annotation-alt-incipit"
        );
    }

    #[test]
    fn test_hex_color_validation() {
        assert!(is_hex_color("#abc"));
        assert!(is_hex_color("#A0B1C2"));
        assert!(!is_hex_color("red"));
        assert!(!is_hex_color("#12345"));
        assert!(!is_hex_color("#ggg"));
    }
}
