//! Layout-string parsing: backend layout output → ordered (box, label) pairs.
//!
//! The layout call returns a single free-form string describing zero or more
//! regions, each as a bracketed box followed by a label token, e.g.
//!
//! ```text
//! [0.12, 0.05, 0.88, 0.10] title [0.10, 0.12, 0.90, 0.45] para [0.10, 0.50, 0.90, 0.85] tab
//! ```
//!
//! Order of occurrence in the string *is* the reading order; nothing here
//! re-sorts geometrically. Coordinates are still in the padded
//! inference-space system — [`crate::geometry`] maps them back to the
//! original image.
//!
//! ## Degradation policy
//!
//! One malformed entry never fails the page. An unparsable box or an unknown
//! label token skips that entry with a `warn!` and the page degrades to
//! fewer regions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Semantic label of a detected region, using the backend's token vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionLabel {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "author")]
    Author,
    /// Section heading.
    #[serde(rename = "sec")]
    Section,
    /// Body paragraph.
    #[serde(rename = "para")]
    Paragraph,
    #[serde(rename = "list")]
    List,
    /// Figure or table caption.
    #[serde(rename = "cap")]
    Caption,
    #[serde(rename = "tab")]
    Table,
    #[serde(rename = "fig")]
    Figure,
    #[serde(rename = "formula")]
    Formula,
    #[serde(rename = "foot")]
    Footnote,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "footer")]
    Footer,
    /// Synthetic separator inserted between pages of a flattened multi-page
    /// element list. Never emitted by the backend and never parsed from a
    /// layout string.
    #[serde(rename = "page_separator")]
    PageSeparator,
}

impl RegionLabel {
    /// Parse a label token from the layout string. `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "sec" => Some(Self::Section),
            "para" => Some(Self::Paragraph),
            "list" => Some(Self::List),
            "cap" => Some(Self::Caption),
            "tab" => Some(Self::Table),
            "fig" => Some(Self::Figure),
            "formula" => Some(Self::Formula),
            "foot" => Some(Self::Footnote),
            "header" => Some(Self::Header),
            "footer" => Some(Self::Footer),
            _ => None,
        }
    }

    /// The backend's token for this label.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Section => "sec",
            Self::Paragraph => "para",
            Self::List => "list",
            Self::Caption => "cap",
            Self::Table => "tab",
            Self::Figure => "fig",
            Self::Formula => "formula",
            Self::Footnote => "foot",
            Self::Header => "header",
            Self::Footer => "footer",
            Self::PageSeparator => "page_separator",
        }
    }

    /// Figures are persisted as crops and never sent for recognition.
    pub fn is_figure(&self) -> bool {
        matches!(self, Self::Figure)
    }

    /// Tables get the table-parsing prompt.
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table)
    }
}

/// One parsed region entry, still in inference-space coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    /// `[x1, y1, x2, y2]` as emitted by the backend. Usually normalized
    /// fractions of the padded image; may be absolute pixels.
    pub bbox: [f32; 4],
    pub label: RegionLabel,
}

static RE_LAYOUT_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[\s*(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\s*\]\s*([A-Za-z_]+)",
    )
    .unwrap()
});

/// Parse the backend's layout string into ordered region entries.
///
/// Returns entries in order of occurrence (= reading order). Malformed or
/// unknown-label entries are skipped individually; an empty vec means the
/// backend saw no usable regions, which is not an error.
pub fn parse_layout_string(layout: &str) -> Vec<LayoutEntry> {
    let mut entries = Vec::new();

    for caps in RE_LAYOUT_ENTRY.captures_iter(layout) {
        let coords: Option<Vec<f32>> = (1..=4).map(|i| caps[i].parse::<f32>().ok()).collect();
        let Some(coords) = coords else {
            warn!("Skipping layout entry with unparsable box: {}", &caps[0]);
            continue;
        };

        let token = &caps[5];
        let Some(label) = RegionLabel::from_token(token) else {
            warn!("Skipping layout entry with unknown label '{}'", token);
            continue;
        };

        let bbox = [coords[0], coords[1], coords[2], coords[3]];
        if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
            warn!(
                "Skipping layout entry with inverted box {:?} ({})",
                bbox, token
            );
            continue;
        }

        entries.push(LayoutEntry { bbox, label });
    }

    entries
}
