//! HTML rendering of a decoration set over plain text
//!
//! Text is split at every decoration boundary so overlapping decorations
//! become properly nested `<span>` elements.

use std::collections::BTreeSet;

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::projector::{Decoration, DecorationSet};

/// Configuration for markup rendering
#[derive(Debug, Clone)]
pub struct MarkupConfig {
    /// Data attribute for annotation ID
    pub id_attribute: String,
    /// Data attribute for annotation type
    pub type_attribute: String,
    /// Data attribute for the human-readable label
    pub label_attribute: String,
    /// Whether to include inline colour styles
    pub include_inline_styles: bool,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            id_attribute: "data-annotation-id".to_string(),
            type_attribute: "data-annotation-type".to_string(),
            label_attribute: "data-annotation-label".to_string(),
            include_inline_styles: true,
        }
    }
}

/// Render `text` with every decoration wrapped in a span
pub fn render_markup(text: &str, decorations: &DecorationSet, config: &MarkupConfig) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if decorations.is_empty() {
        return encode_text(text).into_owned();
    }

    let mut boundaries: BTreeSet<usize> = BTreeSet::new();
    boundaries.insert(0);
    boundaries.insert(len);
    for d in decorations {
        boundaries.insert(d.start.min(len));
        boundaries.insert(d.end.min(len));
    }

    let points: Vec<usize> = boundaries.into_iter().collect();
    let mut output = String::with_capacity(text.len() * 2);

    for window in points.windows(2) {
        let (from, to) = (window[0], window[1]);
        let segment: String = chars[from..to].iter().collect();
        let escaped = encode_text(&segment);

        let active: Vec<&Decoration> = decorations
            .iter()
            .filter(|d| d.start <= from && to <= d.end)
            .collect();

        for d in &active {
            output.push_str(&open_tag(d, config));
        }
        output.push_str(&escaped);
        for _ in &active {
            output.push_str("</span>");
        }
    }

    output
}

fn open_tag(decoration: &Decoration, config: &MarkupConfig) -> String {
    let style = if config.include_inline_styles {
        format!(
            " style=\"background-color: {}; color: {};\"",
            encode_double_quoted_attribute(&decoration.colors.background),
            encode_double_quoted_attribute(&decoration.colors.foreground)
        )
    } else {
        String::new()
    };

    format!(
        "<span class=\"{}\" {}=\"{}\" {}=\"{}\" {}=\"{}\"{}>",
        encode_double_quoted_attribute(&decoration.class),
        config.id_attribute,
        encode_double_quoted_attribute(&decoration.attributes.annotation_id),
        config.type_attribute,
        decoration.attributes.annotation_type,
        config.label_attribute,
        encode_double_quoted_attribute(&decoration.attributes.label),
        style
    )
}
