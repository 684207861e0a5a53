//! Markdown rendering seam.
//!
//! The flat markdown rendering is an external concern: the pipeline hands
//! the *original* (non-normalized) element list to whatever implements
//! [`MarkdownRenderer`] and treats failure or absence as non-fatal — JSON
//! results are always produced, markdown is best-effort.
//!
//! [`FlatMarkdownRenderer`] is the built-in default: a deterministic
//! label-driven formatter good enough for review and diffing. Swap it out
//! via [`crate::config::ParseConfigBuilder::markdown_renderer`] or disable
//! rendering entirely with `without_markdown()`.

use crate::layout::RegionLabel;
use crate::output::RecognizedElement;
use thiserror::Error;

/// A markdown rendering failure. Logged and skipped, never fatal.
#[derive(Debug, Clone, Error)]
#[error("markdown rendering failed: {0}")]
pub struct RenderError(pub String);

/// Renders a flat element list (already in reading order, page separators
/// included for multi-page documents) to a single markdown string.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, elements: &[RecognizedElement]) -> Result<String, RenderError>;
}

/// Built-in label-driven renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatMarkdownRenderer;

impl MarkdownRenderer for FlatMarkdownRenderer {
    fn render(&self, elements: &[RecognizedElement]) -> Result<String, RenderError> {
        let mut blocks: Vec<String> = Vec::with_capacity(elements.len());

        for element in elements {
            let text = element.text.trim();
            if text.is_empty() {
                continue;
            }
            let block = match element.label {
                RegionLabel::Title => format!("# {text}"),
                RegionLabel::Section => format!("## {text}"),
                RegionLabel::Author | RegionLabel::Caption => format!("*{text}*"),
                RegionLabel::Formula => {
                    if text.starts_with("$$") {
                        text.to_string()
                    } else {
                        format!("$${text}$$")
                    }
                }
                // Page headers/footers repeat on every page and carry no
                // content for a flat rendering.
                RegionLabel::Header | RegionLabel::Footer => continue,
                // Tables pass through as recognized (HTML or pipe syntax);
                // figures already carry their image reference in `text`.
                RegionLabel::PageSeparator => element.text.trim_matches('\n').to_string(),
                _ => text.to_string(),
            };
            blocks.push(block);
        }

        let mut out = blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(label: RegionLabel, text: &str, order: usize) -> RecognizedElement {
        RecognizedElement {
            label,
            bbox: Some([0, 0, 10, 10]),
            text: text.into(),
            figure_path: None,
            reading_order: order,
            parsed_content: None,
        }
    }

    #[test]
    fn titles_and_sections_become_headings() {
        let elements = vec![
            elem(RegionLabel::Title, "Report", 0),
            elem(RegionLabel::Section, "Methods", 1),
            elem(RegionLabel::Paragraph, "We measured things.", 2),
        ];
        let md = FlatMarkdownRenderer.render(&elements).unwrap();
        assert_eq!(md, "# Report\n\n## Methods\n\nWe measured things.\n");
    }

    #[test]
    fn headers_and_footers_are_dropped() {
        let elements = vec![
            elem(RegionLabel::Header, "CONFIDENTIAL", 0),
            elem(RegionLabel::Paragraph, "body", 1),
            elem(RegionLabel::Footer, "page 3", 2),
        ];
        let md = FlatMarkdownRenderer.render(&elements).unwrap();
        assert_eq!(md, "body\n");
    }

    #[test]
    fn page_separator_text_passes_through() {
        let elements = vec![
            elem(RegionLabel::Paragraph, "one", 0),
            RecognizedElement::page_separator("\n\n---\n\n".into(), 1),
            elem(RegionLabel::Paragraph, "two", 2),
        ];
        let md = FlatMarkdownRenderer.render(&elements).unwrap();
        assert_eq!(md, "one\n\n---\n\ntwo\n");
    }

    #[test]
    fn empty_elements_render_to_empty_string() {
        let md = FlatMarkdownRenderer.render(&[]).unwrap();
        assert!(md.is_empty());
    }
}
