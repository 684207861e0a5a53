//! Configuration types for document parsing.
//!
//! All pipeline behaviour is controlled through [`ParseConfig`], built via
//! its [`ParseConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::DocParseError;
use crate::geometry::DEFAULT_MONOTONICITY_TOLERANCE_PX;
use crate::markdown::{FlatMarkdownRenderer, MarkdownRenderer};
use crate::progress::ParseProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a document parsing run.
///
/// Built via [`ParseConfig::builder()`] or [`ParseConfig::default()`].
///
/// # Example
/// ```rust
/// use pageparse::ParseConfig;
///
/// let config = ParseConfig::builder()
///     .max_batch_size(8)
///     .save_dir("results")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// Maximum number of elements recognised in one backend call. Default: 4.
    ///
    /// Larger batches amortise per-call overhead but raise peak memory on the
    /// backend and make a single failure more expensive (the backend has no
    /// partial-batch semantics, so one bad crop fails the whole batch).
    pub max_batch_size: usize,

    /// Number of recognition batches in flight at once per page. Default: 1.
    ///
    /// 1 reproduces strictly sequential dispatch. Raising it is safe only
    /// when the backend accepts concurrent batch calls; results are always
    /// reassembled by batch index, never completion order.
    pub batch_concurrency: usize,

    /// Maximum rendered page dimension (width or height) in pixels when
    /// rasterising PDFs. Default: 2000.
    ///
    /// A safety cap: an A0 poster rendered without one could produce a
    /// 13 000 × 18 000 px image and exhaust memory.
    pub max_rendered_pixels: u32,

    /// Resize the padded inference image so its longest edge equals this
    /// value. `None` keeps the original resolution (padding only).
    pub inference_edge: Option<u32>,

    /// Tolerance in original-image pixels for the reading-order monotonicity
    /// guard. Default: [`DEFAULT_MONOTONICITY_TOLERANCE_PX`].
    ///
    /// See [`crate::geometry`] for the exact trigger condition.
    pub monotonicity_tolerance_px: u32,

    /// Maximum retry attempts for a failed backend call. Default: 3.
    ///
    /// Transient 5xx/timeout failures dominate under concurrent load; three
    /// retries catch most of them. A batch that still fails afterwards fails
    /// its page.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s, avoiding the
    /// thundering-herd problem when several batches retry at once.
    pub retry_backoff_ms: u64,

    /// Directory for persisted outputs (`recognition_json/`, `markdown/`,
    /// `figures/`). `None` keeps everything in memory — figures are then
    /// skipped entirely since their only representation is an on-disk crop.
    pub save_dir: Option<PathBuf>,

    /// Separator element inserted between pages of the flattened element
    /// list handed to the markdown renderer. Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress callback.
    pub progress_callback: Option<Arc<dyn ParseProgressCallback>>,

    /// Markdown renderer for the flat element list. `None` skips markdown
    /// output entirely; a renderer that fails is logged and skipped, never
    /// fatal. Default: the built-in [`FlatMarkdownRenderer`].
    pub markdown_renderer: Option<Arc<dyn MarkdownRenderer>>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4,
            batch_concurrency: 1,
            max_rendered_pixels: 2000,
            inference_edge: None,
            monotonicity_tolerance_px: DEFAULT_MONOTONICITY_TOLERANCE_PX,
            max_retries: 3,
            retry_backoff_ms: 500,
            save_dir: None,
            page_separator: PageSeparator::default(),
            download_timeout_secs: 120,
            progress_callback: None,
            markdown_renderer: Some(Arc::new(FlatMarkdownRenderer)),
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("max_batch_size", &self.max_batch_size)
            .field("batch_concurrency", &self.batch_concurrency)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("inference_edge", &self.inference_edge)
            .field("monotonicity_tolerance_px", &self.monotonicity_tolerance_px)
            .field("max_retries", &self.max_retries)
            .field("save_dir", &self.save_dir)
            .field("page_separator", &self.page_separator)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .field(
                "markdown_renderer",
                &self.markdown_renderer.as_ref().map(|_| "<dyn renderer>"),
            )
            .finish()
    }
}

impl ParseConfig {
    /// Create a new builder for `ParseConfig`.
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config.max_batch_size = n.max(1);
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn inference_edge(mut self, edge: u32) -> Self {
        self.config.inference_edge = Some(edge.max(64));
        self
    }

    pub fn monotonicity_tolerance_px(mut self, px: u32) -> Self {
        self.config.monotonicity_tolerance_px = px;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.save_dir = Some(dir.into());
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ParseProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn markdown_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.config.markdown_renderer = Some(renderer);
        self
    }

    /// Skip markdown output entirely.
    pub fn without_markdown(mut self) -> Self {
        self.config.markdown_renderer = None;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, DocParseError> {
        let c = &self.config;
        if c.max_batch_size == 0 {
            return Err(DocParseError::InvalidConfig(
                "max_batch_size must be ≥ 1".into(),
            ));
        }
        if c.batch_concurrency == 0 {
            return Err(DocParseError::InvalidConfig(
                "batch_concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The synthetic pseudo-element inserted between pages of a flattened
/// multi-page element list before markdown rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Horizontal rule: `"\n\n---\n\n"`. (default)
    #[default]
    HorizontalRule,
    /// No separator element at all.
    None,
    /// Custom separator text.
    Custom(String),
}

impl PageSeparator {
    /// The separator text, or `None` when no pseudo-element should be inserted.
    pub fn text(&self) -> Option<String> {
        match self {
            PageSeparator::HorizontalRule => Some("\n\n---\n\n".to_string()),
            PageSeparator::None => None,
            PageSeparator::Custom(s) => Some(s.clone()),
        }
    }
}
