//! Pipeline stages for page-element parsing.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different rasterisation backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ prepare ──▶ elements
//! (URL/path) (pdfium)  (pad+dims)  (layout → map → batch → recognize)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local
//!    file and reject unsupported types
//! 2. [`render`]   — rasterise PDF pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`prepare`]  — pad each page to the square inference canvas and
//!    record the geometry needed to map boxes back
//! 4. [`elements`] — the per-page element pipeline: parse the layout
//!    string, map coordinates, classify and batch regions, dispatch
//!    recognition, and reassemble in reading order — the only stage with
//!    network I/O

pub mod elements;
pub mod input;
pub mod prepare;
pub mod render;
