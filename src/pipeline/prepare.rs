//! Inference-space preparation: pad the page to a square canvas.
//!
//! The recognition backend expects square inputs, so each page is centred
//! on a white square canvas whose side is the page's longer edge, then
//! optionally resized to a fixed inference edge. The resulting
//! [`PadDimensions`] carry everything [`crate::geometry`] needs to undo the
//! transform — the pipeline crops element regions out of *this* image, but
//! reports their boxes in original coordinates.

use crate::geometry::PadDimensions;
use image::{imageops, Rgb, RgbImage};
use tracing::debug;

/// A page padded (and optionally resized) into inference space.
#[derive(Debug, Clone)]
pub struct PaddedImage {
    pub image: RgbImage,
    pub dims: PadDimensions,
}

/// Pad `page` to a white square and optionally resize the square so its
/// edge equals `inference_edge`.
pub fn prepare_inference_image(page: &RgbImage, inference_edge: Option<u32>) -> PaddedImage {
    let (w, h) = (page.width(), page.height());
    let side = w.max(h).max(1);
    let pad_left = (side - w) / 2;
    let pad_top = (side - h) / 2;

    let mut canvas = RgbImage::from_pixel(side, side, Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, page, pad_left as i64, pad_top as i64);

    let (canvas, inference_side) = match inference_edge {
        Some(edge) if edge != side => (
            imageops::resize(&canvas, edge, edge, imageops::FilterType::CatmullRom),
            edge,
        ),
        _ => (canvas, side),
    };

    debug!(
        "Prepared inference image: {w}x{h} → padded {side}x{side} → {inference_side}x{inference_side}"
    );

    PaddedImage {
        image: canvas,
        dims: PadDimensions {
            orig_width: w,
            orig_height: h,
            pad_left,
            pad_top,
            padded_width: side,
            padded_height: side,
            inference_width: inference_side,
            inference_height: inference_side,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_page_is_padded_vertically() {
        let page = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
        let padded = prepare_inference_image(&page, None);
        let d = padded.dims;
        assert_eq!((d.padded_width, d.padded_height), (200, 200));
        assert_eq!(d.pad_left, 0);
        assert_eq!(d.pad_top, 50);
        assert_eq!(d.inference_width, 200);
        // Padding rows are white, page rows are black.
        assert_eq!(padded.image.get_pixel(100, 10), &Rgb([255, 255, 255]));
        assert_eq!(padded.image.get_pixel(100, 100), &Rgb([0, 0, 0]));
    }

    #[test]
    fn resize_applies_when_edge_differs() {
        let page = RgbImage::from_pixel(100, 50, Rgb([0, 0, 0]));
        let padded = prepare_inference_image(&page, Some(400));
        assert_eq!(padded.image.width(), 400);
        assert_eq!(padded.dims.inference_width, 400);
        assert_eq!(padded.dims.padded_width, 100);
        assert!((padded.dims.scale() - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn square_page_needs_no_padding() {
        let page = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let d = prepare_inference_image(&page, None).dims;
        assert_eq!(d.pad_left, 0);
        assert_eq!(d.pad_top, 0);
        assert_eq!(d.scale(), 1.0);
    }
}
