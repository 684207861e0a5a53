//! Document structure normalizer: recognized markup → typed structural tree.
//!
//! Table recognition returns HTML fragments; text recognition occasionally
//! does too (headings, lists, paragraphs). [`normalize`] turns that content
//! into a [`StructuredNode`] with an explicit decision order:
//!
//! 1. no angle-bracket markup at all → [`StructuredNode::Text`]
//! 2. any `<table>` elements → [`StructuredNode::Table`] (one) or
//!    [`StructuredNode::MultipleTables`] (several)
//! 3. lists, then headings, then paragraphs, in that scan order → the single
//!    match directly, or [`StructuredNode::MixedContent`] preserving the
//!    scan order (NOT document reading order — determinism over geometry)
//! 4. nothing structural → [`StructuredNode::Text`] with the extracted
//!    plain text
//!
//! The function is pure and deterministic: same input string, same tree,
//! no side effects, and it never mutates or replaces the element the
//! content came from. html5ever (under `scraper`) is error-recovering, so
//! malformed markup degrades to whatever tree it can build instead of
//! raising; the `parse_error` field on [`StructuredNode::Text`] is kept in
//! the schema for callers that persist normalizer failures.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Typed structural tree derived from a recognized element's content.
///
/// Serialises with a `type` tag matching the persisted JSON schema, e.g.
/// `{"type": "heading", "level": 2, "content": "Title"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredNode {
    /// Plain text, or the fallback for content with no recognizable structure.
    Text {
        content: String,
        /// Populated only when the underlying markup parse failed outright.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        parse_error: Option<String>,
    },
    Paragraph {
        content: String,
    },
    Heading {
        /// 1–6, from the heading tag name.
        level: u8,
        content: String,
    },
    List {
        /// `ul` or `ol`, as found in the markup.
        list_type: ListKind,
        items: Vec<String>,
    },
    Table {
        rows: Vec<Vec<TableCell>>,
    },
    /// Several tables in one fragment; each entry is a [`StructuredNode::Table`].
    MultipleTables {
        tables: Vec<StructuredNode>,
    },
    /// More than one structural element outside a table context.
    MixedContent {
        elements: Vec<StructuredNode>,
    },
}

/// Ordered vs. unordered list, serialised as the source tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    #[serde(rename = "ul")]
    Unordered,
    #[serde(rename = "ol")]
    Ordered,
}

impl ListKind {
    pub fn is_ordered(&self) -> bool {
        matches!(self, ListKind::Ordered)
    }
}

/// One table cell with its span attributes resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub content: String,
    /// `td` (data cell) or `th` (header cell).
    pub tag: String,
    pub colspan: u32,
    pub rowspan: u32,
}

// Selectors are static and known-valid; compiling them once is the same
// Lazy idiom the regex statics use.
static SEL_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static SEL_TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static SEL_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());
static SEL_LIST: Lazy<Selector> = Lazy::new(|| Selector::parse("ul, ol").unwrap());
static SEL_LI: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static SEL_HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static SEL_P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Normalize recognized content into a structural tree.
pub fn normalize(content: &str) -> StructuredNode {
    // Cheap pre-check: no markup at all, keep the text verbatim.
    if !(content.contains('<') && content.contains('>')) {
        return StructuredNode::Text {
            content: content.to_string(),
            parse_error: None,
        };
    }

    let fragment = Html::parse_fragment(content);

    // Tables dominate: a fragment with tables is a table result even when
    // stray paragraphs surround it.
    let tables: Vec<StructuredNode> = fragment.select(&SEL_TABLE).map(parse_table).collect();
    match tables.len() {
        0 => {}
        1 => return tables.into_iter().next().expect("len checked"),
        _ => return StructuredNode::MultipleTables { tables },
    }

    // Scan order is fixed — lists, then headings, then paragraphs — so the
    // output is deterministic regardless of where each sits in the fragment.
    let mut elements: Vec<StructuredNode> = Vec::new();

    for list in fragment.select(&SEL_LIST) {
        let list_type = if list.value().name() == "ol" {
            ListKind::Ordered
        } else {
            ListKind::Unordered
        };
        let items = list.select(&SEL_LI).map(|li| collapsed_text(&li)).collect();
        elements.push(StructuredNode::List { list_type, items });
    }

    for heading in fragment.select(&SEL_HEADING) {
        let name = heading.value().name();
        let level = name[1..].parse::<u8>().unwrap_or(1).clamp(1, 6);
        elements.push(StructuredNode::Heading {
            level,
            content: collapsed_text(&heading),
        });
    }

    for para in fragment.select(&SEL_P) {
        elements.push(StructuredNode::Paragraph {
            content: collapsed_text(&para),
        });
    }

    match elements.len() {
        0 => {
            // Markup present but nothing structural: fall back to the
            // extracted plain text.
            let text: String = fragment
                .root_element()
                .text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            StructuredNode::Text {
                content: text,
                parse_error: None,
            }
        }
        1 => elements.into_iter().next().expect("len checked"),
        _ => StructuredNode::MixedContent { elements },
    }
}

fn parse_table(table: ElementRef<'_>) -> StructuredNode {
    let rows = table
        .select(&SEL_TR)
        .map(|row| row.select(&SEL_CELL).map(parse_cell).collect())
        .collect();
    StructuredNode::Table { rows }
}

fn parse_cell(cell: ElementRef<'_>) -> TableCell {
    TableCell {
        content: collapsed_text(&cell),
        tag: cell.value().name().to_string(),
        colspan: span_attr(&cell, "colspan"),
        rowspan: span_attr(&cell, "rowspan"),
    }
}

/// Span attributes default to 1 when absent, non-numeric, or zero.
fn span_attr(cell: &ElementRef<'_>, name: &str) -> u32 {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&v| v >= 1)
        .unwrap_or(1)
}

/// Text content with each fragment stripped, concatenated directly.
fn collapsed_text(el: &ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}
