//! # pageparse
//!
//! Vision-model document parsing: turn PDFs and page images into
//! structured, reading-ordered elements plus optional markdown.
//!
//! The pipeline mirrors how a layout-aware vision model is actually
//! driven in production:
//!
//! 1. **Input resolution** — local path or URL, PDF or image, validated
//!    by extension and magic bytes ([`pipeline::input`])
//! 2. **Rasterisation** — PDF pages rendered via pdfium with a pixel cap
//!    ([`pipeline::render`])
//! 3. **Preparation** — each page padded to a square inference canvas,
//!    geometry recorded for the trip back ([`pipeline::prepare`])
//! 4. **Layout** — one backend call yields the layout string: bounding
//!    boxes plus labels in reading order ([`layout`])
//! 5. **Element processing** — coordinates mapped back to original
//!    pixels, figures cropped and persisted, text and table regions
//!    batched through the backend ([`pipeline::elements`])
//! 6. **Aggregation** — pages combined, structural trees attached,
//!    markdown rendered, outputs persisted ([`parse`])
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pageparse::{parse, HttpBackend, ParseConfig, RecognitionBackend};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend: Arc<dyn RecognitionBackend> =
//!     Arc::new(HttpBackend::new("http://localhost:8501", 300)?);
//! let config = ParseConfig::builder()
//!     .max_batch_size(8)
//!     .save_dir("results")
//!     .build()?;
//!
//! let output = parse("report.pdf", &backend, &config).await?;
//! println!(
//!     "{} elements across {} pages",
//!     output.document.element_count(),
//!     output.stats.total_pages
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! Failures split into three tiers: [`DocParseError`] aborts the whole
//! run, [`PageError`] fails one page while others proceed, and
//! region-level problems (a malformed layout entry, a degenerate box)
//! are logged and skipped without failing anything.

pub mod backend;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod markdown;
pub mod output;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod structure;

pub use backend::{BackendError, HttpBackend, RecognitionBackend};
pub use config::{PageSeparator, ParseConfig, ParseConfigBuilder};
pub use error::{DocParseError, PageError};
pub use layout::{parse_layout_string, LayoutEntry, RegionLabel};
pub use markdown::{FlatMarkdownRenderer, MarkdownRenderer, RenderError};
pub use output::{
    DocumentResult, PageResult, ParseOutput, ParseStats, ParseStatus, ParsedDocument,
    RecognizedElement,
};
pub use parse::{parse, parse_image, parse_pages};
pub use progress::ParseProgressCallback;
pub use structure::{normalize, ListKind, StructuredNode, TableCell};
