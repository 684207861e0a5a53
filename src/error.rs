//! Error types for the pageparse library.
//!
//! Three tiers reflect three distinct blast radii:
//!
//! * [`DocParseError`] — **Fatal**: the run cannot proceed at all (missing
//!   file, unsupported type, layout call failed for a single image, output
//!   directory unwritable). Returned as `Err(DocParseError)` from the
//!   top-level `parse*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (layout call
//!   failed, batch recognition call failed) but other pages of the same
//!   document are fine. Stored inside [`crate::output::PageResult`] so
//!   callers can inspect partial success instead of losing the whole
//!   document to one bad page.
//!
//! * [`RegionError`] — **Absorbed**: a single region of a page was
//!   unusable (degenerate or collapsed box after mapping). Logged and
//!   skipped inside the element pipeline; the page degrades to fewer
//!   regions and never surfaces this tier to callers. Unparsable layout
//!   entries are skipped directly by the parser without an error value.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pageparse library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocParseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Rejected before any processing begins: extension is not a supported
    /// document type.
    #[error("Unsupported file type '{extension}' for '{path}'\nSupported: .pdf .jpg .jpeg .png")]
    UnsupportedFileType { path: PathBuf, extension: String },

    /// The file exists and was read, but its magic bytes match no supported format.
    #[error("File is not a supported document: '{path}'\nFirst bytes: {magic:?}")]
    NotADocument { path: PathBuf, magic: [u8; 4] },

    /// The image file could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// The layout call failed for a single-image input (nothing to salvage).
    #[error("Layout detection failed: {detail}")]
    LayoutFailed { detail: String },

    /// Every page of the document failed; output would be empty.
    #[error("All {total} pages failed to process.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file. In-memory results computed
    /// before the write are unaffected.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page of a multi-page document.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The overall run continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page-level layout call failed.
    #[error("Page {page}: layout detection failed: {detail}")]
    LayoutFailed { page: usize, detail: String },

    /// A batch recognition call failed. The backend has no partial-batch
    /// semantics, so the whole page is reported failed; callers may retry
    /// the full page.
    #[error("Page {page}: recognition batch {batch} failed: {detail}")]
    BatchFailed {
        page: usize,
        batch: usize,
        detail: String,
    },
}

/// A per-region failure absorbed inside the element pipeline.
///
/// Never crosses the page boundary: the offending region is logged and
/// skipped, and the page assembles best-effort from the remaining regions.
#[derive(Debug, Clone, Error)]
pub enum RegionError {
    /// Coordinate mapping produced a degenerate (zero-area) box.
    #[error("degenerate box after mapping: {detail}")]
    Coordinate { detail: String },
}
