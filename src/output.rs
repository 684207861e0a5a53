//! Result types: recognized elements, pages, documents, and run statistics.
//!
//! Field names follow the persisted JSON schema: per-image results are a
//! bare list of elements, PDF results keep their `pages` structure:
//!
//! ```json
//! {
//!   "source_file": "report.pdf",
//!   "total_pages": 2,
//!   "pages": [
//!     { "page_number": 1, "elements": [ { "label": "para", "bbox": [12, 40, 580, 95],
//!       "text": "…", "reading_order": 0, "parsed_content": { "type": "text", … } } ] }
//!   ]
//! }
//! ```

use crate::error::PageError;
use crate::layout::RegionLabel;
use crate::structure::StructuredNode;
use serde::{Deserialize, Serialize};

/// One recognized page element in reading order.
///
/// Exactly one of `text`-from-recognition or `figure_path` is meaningful,
/// decided solely by the label: figures carry a persisted crop path and a
/// markdown image reference in `text`; everything else carries recognized
/// content in `text` and no `figure_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedElement {
    pub label: RegionLabel,
    /// `[x1, y1, x2, y2]` in original-image pixels. Absent only on the
    /// synthetic page-separator pseudo-element.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bbox: Option<[u32; 4]>,
    /// Recognized content; markdown/HTML-flavoured for tables, an
    /// `![Figure](…)` reference for figures.
    pub text: String,
    /// Relative path of the persisted crop, figures only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub figure_path: Option<String>,
    /// Dense zero-based rank within the page, assigned in layout order.
    pub reading_order: usize,
    /// Structural tree derived from `text`; attached by the aggregator,
    /// never consumed by the markdown renderer.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parsed_content: Option<StructuredNode>,
}

impl RecognizedElement {
    /// The synthetic pseudo-element inserted between pages before markdown
    /// rendering.
    pub fn page_separator(text: String, reading_order: usize) -> Self {
        Self {
            label: RegionLabel::PageSeparator,
            bbox: None,
            text,
            figure_path: None,
            reading_order,
            parsed_content: None,
        }
    }
}

/// One page of a multi-page document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in the source document.
    pub page_number: usize,
    /// Empty when the page failed.
    pub elements: Vec<RecognizedElement>,
    /// Set when this page failed; earlier pages are unaffected.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<PageError>,
}

/// Combined result for a multi-page document. Pages stay structured; the
/// flattened element list exists only transiently for markdown rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub source_file: String,
    pub total_pages: usize,
    pub pages: Vec<PageResult>,
}

/// What a parse run produced: a bare element list for a single image, or a
/// page-structured result for a PDF.
#[derive(Debug, Clone)]
pub enum ParsedDocument {
    Image(Vec<RecognizedElement>),
    Pdf(DocumentResult),
}

impl ParsedDocument {
    /// All successfully recognized elements, across pages for PDFs.
    pub fn element_count(&self) -> usize {
        match self {
            ParsedDocument::Image(elements) => elements.len(),
            ParsedDocument::Pdf(doc) => doc.pages.iter().map(|p| p.elements.len()).sum(),
        }
    }
}

/// Overall status of a run, per the error-propagation policy: callers can
/// always distinguish fully processed, partially processed, and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// Every page produced elements.
    Complete,
    /// At least one page failed; its 1-indexed numbers are listed.
    Partial { failed_pages: Vec<usize> },
    /// Nothing was processed. Runs that would report this are returned as
    /// `Err(DocParseError::AllPagesFailed)` instead, so this variant only
    /// appears when callers construct statuses themselves.
    Failed,
}

/// Timing and volume statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub total_elements: usize,
    /// Wall time spent in layout calls.
    pub layout_duration_ms: u64,
    /// Wall time spent in recognition batch calls.
    pub recognition_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Top-level output of the `parse*` entry points.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub document: ParsedDocument,
    /// Path of the persisted JSON, when a save dir was configured.
    pub json_path: Option<std::path::PathBuf>,
    /// Path of the persisted markdown, when a renderer ran and a save dir
    /// was configured.
    pub markdown_path: Option<std::path::PathBuf>,
    pub stats: ParseStats,
}

impl ParseOutput {
    /// Status derived from the per-page outcomes.
    pub fn status(&self) -> ParseStatus {
        match &self.document {
            ParsedDocument::Image(_) => ParseStatus::Complete,
            ParsedDocument::Pdf(doc) => {
                let failed: Vec<usize> = doc
                    .pages
                    .iter()
                    .filter(|p| p.error.is_some())
                    .map(|p| p.page_number)
                    .collect();
                if failed.is_empty() {
                    ParseStatus::Complete
                } else if failed.len() == doc.pages.len() {
                    ParseStatus::Failed
                } else {
                    ParseStatus::Partial {
                        failed_pages: failed,
                    }
                }
            }
        }
    }
}
