//! Coordinate mapping between padded inference space and the original image.
//!
//! The recognition backend sees a padded (and optionally resized) copy of the
//! page, so every box it reports lives in that *inference space*. This module
//! maps each box back onto the original pixel grid, clamps it to bounds, and
//! applies a monotonicity guard against the previously mapped box.
//!
//! ## Monotonicity guard
//!
//! The backend occasionally emits slightly out-of-order boxes at region
//! seams: a box whose top edge sits a few pixels *above* the previous
//! region even though it follows it in reading order. The guard triggers
//! when the new box starts more than the configured tolerance above the
//! previous box's top edge **while horizontally overlapping it** (a box in
//! a fresh column legitimately restarts at the top of the page and is left
//! alone). The correction clamps the top edge down to the previous box's
//! top edge. This is a heuristic, not a geometric proof; the tolerance
//! below was chosen to cover observed seam jitter without disturbing real
//! two-column layouts.
//!
//! State is threaded explicitly: each call returns the box to pass as
//! `previous` for the next region of the same page, and nothing here holds
//! module-level state, so the page-local nature of the fold is visible in
//! the signatures.

use crate::error::RegionError;

/// Default tolerance for the monotonicity guard, in original-image pixels.
pub const DEFAULT_MONOTONICITY_TOLERANCE_PX: u32 = 5;

/// Geometry of the padded inference image relative to the original page.
///
/// Padding is applied first (at original resolution), then the padded image
/// is optionally resized, so a point maps forward as
/// `inference = (original + pad) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadDimensions {
    pub orig_width: u32,
    pub orig_height: u32,
    /// Offset of the original image inside the padded canvas.
    pub pad_left: u32,
    pub pad_top: u32,
    /// Padded canvas size at original resolution.
    pub padded_width: u32,
    pub padded_height: u32,
    /// Final inference image size after the optional resize.
    pub inference_width: u32,
    pub inference_height: u32,
}

impl PadDimensions {
    /// Inference pixels per original pixel. 1.0 when no resize was applied.
    pub fn scale(&self) -> f32 {
        self.inference_width as f32 / self.padded_width as f32
    }
}

/// An integer box `[x1, y1, x2, y2]`, half-open on the right/bottom edges.
pub type Box2D = [u32; 4];

/// A region mapped into both coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedRegion {
    /// Clamped box in inference space, used to crop the padded image.
    pub inference: Box2D,
    /// Corresponding box in original-image space, used for reporting.
    pub original: Box2D,
}

/// Map one inference-space box back to original coordinates.
///
/// `bbox` values at or below 1.5 are treated as normalized fractions of the
/// inference image (what the layout model emits); larger values are taken as
/// absolute inference pixels.
///
/// `previous` is the original-space box returned for the preceding region of
/// the same page (`None` for the first region); on success the returned
/// [`MappedRegion::original`] becomes the next call's `previous`.
///
/// # Errors
/// [`RegionError::Coordinate`] when the box is degenerate (zero area) after
/// clamping — the caller drops the region and continues the page.
pub fn map_region(
    bbox: [f32; 4],
    dims: &PadDimensions,
    previous: Option<Box2D>,
    tolerance_px: u32,
) -> Result<MappedRegion, RegionError> {
    let (iw, ih) = (dims.inference_width as f32, dims.inference_height as f32);

    // Normalized fractions vs. absolute inference pixels.
    let normalized = bbox.iter().all(|&v| v <= 1.5);
    let abs = if normalized {
        [bbox[0] * iw, bbox[1] * ih, bbox[2] * iw, bbox[3] * ih]
    } else {
        bbox
    };

    // Clamp to inference bounds.
    let ix1 = abs[0].clamp(0.0, iw).round() as u32;
    let iy1 = abs[1].clamp(0.0, ih).round() as u32;
    let ix2 = abs[2].clamp(0.0, iw).round() as u32;
    let iy2 = abs[3].clamp(0.0, ih).round() as u32;

    if ix2 <= ix1 || iy2 <= iy1 {
        return Err(RegionError::Coordinate {
            detail: format!("inference box [{ix1}, {iy1}, {ix2}, {iy2}] has zero area"),
        });
    }

    // Undo resize and padding to reach the original pixel grid.
    let scale = dims.scale();
    let to_orig_x = |x: u32| -> u32 {
        let unpadded = x as f32 / scale - dims.pad_left as f32;
        unpadded.clamp(0.0, dims.orig_width as f32).round() as u32
    };
    let to_orig_y = |y: u32| -> u32 {
        let unpadded = y as f32 / scale - dims.pad_top as f32;
        unpadded.clamp(0.0, dims.orig_height as f32).round() as u32
    };

    let ox1 = to_orig_x(ix1);
    let mut oy1 = to_orig_y(iy1);
    let ox2 = to_orig_x(ix2);
    let oy2 = to_orig_y(iy2);

    if ox2 <= ox1 || oy2 <= oy1 {
        return Err(RegionError::Coordinate {
            detail: format!("original box [{ox1}, {oy1}, {ox2}, {oy2}] has zero area"),
        });
    }

    // Monotonicity guard against the previous box.
    let mut iy1 = iy1;
    if let Some(prev) = previous {
        let overlaps_horizontally = ox1 < prev[2] && ox2 > prev[0];
        let regresses = oy1 + tolerance_px < prev[1];
        if overlaps_horizontally && regresses {
            oy1 = prev[1];
            // Keep the crop consistent with the corrected original edge.
            iy1 = ((oy1 as f32 + dims.pad_top as f32) * scale)
                .clamp(0.0, ih)
                .round() as u32;
            if oy2 <= oy1 || iy2 <= iy1 {
                return Err(RegionError::Coordinate {
                    detail: format!(
                        "box collapsed by monotonicity correction against previous {prev:?}"
                    ),
                });
            }
        }
    }

    Ok(MappedRegion {
        inference: [ix1, iy1, ix2, iy2],
        original: [ox1, oy1, ox2, oy2],
    })
}
