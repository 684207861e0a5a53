//! PDF rasterisation: render every page to an `RgbImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread pool designed for blocking operations, keeping the Tokio worker
//! threads free during CPU-heavy rendering.
//!
//! ## Why cap pixels?
//!
//! Page sizes vary wildly: an A0 poster could rasterise to a
//! 13 000 × 18 000 px image. `max_pixels` caps the longest edge regardless
//! of physical size, keeping memory bounded and matching the input-size
//! sweet spot of vision backends.

use crate::error::DocParseError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Rasterise every page of a PDF, in document page order.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_pages(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RgbImage>, DocParseError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, max_pixels))
        .await
        .map_err(|e| DocParseError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(pdf_path: &Path, max_pixels: u32) -> Result<Vec<RgbImage>, DocParseError> {
    let pdfium = bind_pdfium()?;

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| DocParseError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| DocParseError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(image);
    }

    Ok(results)
}

/// Bind to a pdfium library, honouring `PDFIUM_LIB_PATH` when set.
///
/// The variable may point at the library file itself or at its containing
/// directory; both are tried before the failure surfaces as
/// [`DocParseError::PdfiumBindingFailed`].
fn bind_pdfium() -> Result<Pdfium, DocParseError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) => Pdfium::bind_to_library(&path).or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
        }),
        Err(_) => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| DocParseError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}
