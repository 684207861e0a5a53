//! Prompts sent to the recognition backend.
//!
//! Centralising them here serves two purposes: changing the wording touches
//! exactly one place, and unit tests can assert prompt selection without a
//! live backend.

use crate::layout::RegionLabel;

/// Page-level prompt for layout and reading-order detection.
pub const LAYOUT_PROMPT: &str = "Parse the reading order of this document.";

/// Element-level prompt for table regions.
pub const TABLE_PROMPT: &str = "Parse the table in the image.";

/// Element-level prompt for text and every other non-figure region.
pub const TEXT_PROMPT: &str = "Read text in the image.";

/// Choose the recognition prompt for a region label.
///
/// Figures never reach recognition, so they have no prompt; callers filter
/// them out before this point.
pub fn recognition_prompt(label: RegionLabel) -> &'static str {
    if label.is_table() {
        TABLE_PROMPT
    } else {
        TEXT_PROMPT
    }
}
