//! Coordinate transformation between top-left page space and PDF user space

use serde::{Deserialize, Serialize};

/// A rectangle in PDF user space (bottom-left origin, points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert a box measured from the page's top-left corner (points) into a
/// PDF rectangle anchored at its bottom-left corner.
///
/// `media_box` is `[x, y, width, height]` as returned by
/// [`PdfDocument::page_dimensions`](crate::PdfDocument::page_dimensions).
pub fn top_left_to_pdf(
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    media_box: [f64; 4],
) -> PdfRect {
    let [mb_x, mb_y, _mb_width, mb_height] = media_box;

    // Flip Y axis
    let y_from_bottom = mb_height - top - height;

    PdfRect {
        x: mb_x + left,
        y: mb_y + y_from_bottom,
        width,
        height,
    }
}
