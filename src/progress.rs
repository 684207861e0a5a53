//! Progress-callback trait for per-page parsing events.
//!
//! Inject an `Arc<dyn ParseProgressCallback>` via
//! [`crate::config::ParseConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar without the library knowing how the host
//! application communicates. The trait is `Send + Sync` so it stays correct
//! if page processing is ever parallelised.

/// Called by the pipeline as it processes each page of a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages of one document are currently processed in
/// order, but implementations should not rely on that.
pub trait ParseProgressCallback: Send + Sync {
    /// Called once before any page is processed.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's layout call is issued.
    fn on_page_start(&self, page_number: usize, total_pages: usize) {
        let _ = (page_number, total_pages);
    }

    /// Called when a page's elements are fully assembled.
    fn on_page_complete(&self, page_number: usize, total_pages: usize, element_count: usize) {
        let _ = (page_number, total_pages, element_count);
    }

    /// Called when a page fails; later pages are still attempted.
    fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
        let _ = (page_number, total_pages, error);
    }

    /// Called once after the last page, with the count of pages that
    /// produced elements.
    fn on_document_complete(&self, total_pages: usize, processed_pages: usize) {
        let _ = (total_pages, processed_pages);
    }
}
