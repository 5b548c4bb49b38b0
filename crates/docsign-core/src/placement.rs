//! Placement geometry normalization
//!
//! Every ratio-versus-absolute decision, clamp and rounding step for
//! signature boxes lives here so the editor, request creation and the
//! compositor agree on what a stored placement means.
//!
//! Canonical geometry expresses `x`, `y`, `width` and `height` as fractions
//! of the page width/height with the origin at the page's top-left corner.
//! Legacy data stores absolute values (rendered pixels or PDF points).

use serde::{Deserialize, Serialize};

use crate::model::Placement;

pub const MIN_WIDTH_RATIO: f64 = 0.05;
pub const MAX_WIDTH_RATIO: f64 = 0.6;
pub const MIN_HEIGHT_RATIO: f64 = 0.05;
pub const MAX_HEIGHT_RATIO: f64 = 0.4;

/// Draw size used for legacy placements that carry no usable size (points)
pub const DEFAULT_DRAW_WIDTH: f64 = 150.0;
pub const DEFAULT_DRAW_HEIGHT: f64 = 60.0;

/// Default box for a click: a fraction of the page, capped in pixels
const CLICK_WIDTH_FRACTION: f64 = 0.2;
const CLICK_WIDTH_CAP_PX: f64 = 160.0;
const CLICK_HEIGHT_FRACTION: f64 = 0.12;
const CLICK_HEIGHT_CAP_PX: f64 = 70.0;

/// Stored ratios keep four decimal places
const RATIO_SCALE: f64 = 10_000.0;

/// Slack for comparisons against page edges after rounding
pub const EDGE_TOLERANCE: f64 = 1e-9;

/// Width and height of a rendered page (pixels) or a PDF page (points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// `None` unless both sides are finite and positive
    pub fn new(width: f64, height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(width) && valid(height)).then_some(Self { width, height })
    }
}

/// Canonical box: ratios of the page, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn into_placement(self, page: u32) -> Placement {
        Placement::new(page, self.x, self.y, self.width, self.height)
    }

    /// True when the box lies on the page and within the size bounds
    pub fn is_canonical(&self) -> bool {
        let in_range = |v: f64, lo: f64, hi: f64| {
            v >= lo - EDGE_TOLERANCE && v <= hi + EDGE_TOLERANCE
        };
        in_range(self.width, MIN_WIDTH_RATIO, MAX_WIDTH_RATIO)
            && in_range(self.height, MIN_HEIGHT_RATIO, MAX_HEIGHT_RATIO)
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= 1.0 + EDGE_TOLERANCE
            && self.y + self.height <= 1.0 + EDGE_TOLERANCE
    }
}

/// Absolute box in page points, top-left origin, already clamped to the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.max(min).min(max)
    }
}

pub fn round_ratio(value: f64) -> f64 {
    (value * RATIO_SCALE).round() / RATIO_SCALE
}

fn floor_ratio(value: f64) -> f64 {
    (value * RATIO_SCALE).floor() / RATIO_SCALE
}

/// A position is a ratio when it lies in [0, 1]
fn is_position_ratio(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// A size is a ratio when it lies in (0, 1]
fn is_extent_ratio(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

/// Interpret an edited value: anything above 1 is pixels and needs the
/// rendered dimension to convert; anything else is already a ratio.
///
/// Returns `None` when the value is not a number or when a pixel value
/// arrives before the page has been rendered.
pub fn to_ratio(value: f64, dimension: Option<f64>) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if value > 1.0 {
        dimension.filter(|d| *d > 0.0).map(|d| value / d)
    } else {
        Some(value)
    }
}

/// Clamp raw ratios into canonical bounds and round them
pub fn canonicalize(x: f64, y: f64, width: f64, height: f64) -> Geometry {
    let width = round_ratio(clamp(width, MIN_WIDTH_RATIO, MAX_WIDTH_RATIO));
    let height = round_ratio(clamp(height, MIN_HEIGHT_RATIO, MAX_HEIGHT_RATIO));
    Geometry {
        x: fit_offset(x, width),
        y: fit_offset(y, height),
        width,
        height,
    }
}

/// Clamp an offset so `offset + extent <= 1` still holds after rounding
fn fit_offset(offset: f64, extent: f64) -> f64 {
    let max = 1.0 - extent;
    let rounded = round_ratio(clamp(offset, 0.0, max));
    if rounded > max {
        floor_ratio(max)
    } else {
        rounded
    }
}

/// Default-sized box centered on a click, in canonical form
pub fn box_at_click(click_x: f64, click_y: f64, rendered: PageSize) -> Geometry {
    let width_px = (rendered.width * CLICK_WIDTH_FRACTION).min(CLICK_WIDTH_CAP_PX);
    let height_px = (rendered.height * CLICK_HEIGHT_FRACTION).min(CLICK_HEIGHT_CAP_PX);

    let width = clamp(width_px / rendered.width, MIN_WIDTH_RATIO, MAX_WIDTH_RATIO);
    let height = clamp(height_px / rendered.height, MIN_HEIGHT_RATIO, MAX_HEIGHT_RATIO);

    let x = (click_x - width * rendered.width / 2.0) / rendered.width;
    let y = (click_y - height * rendered.height / 2.0) / rendered.height;

    canonicalize(x, y, width, height)
}

/// Convert any stored placement into canonical geometry against a known
/// page size. Absolute values are divided by the page size; missing sizes
/// use the 150x60 default.
pub fn normalize_for_page(placement: &Placement, page: PageSize) -> Geometry {
    let position = |value: f64, dimension: f64| {
        if is_position_ratio(value) {
            value
        } else {
            clamp(value / dimension, 0.0, 1.0)
        }
    };
    let extent = |value: Option<f64>, dimension: f64, default: f64| match value {
        Some(v) if is_extent_ratio(v) => v,
        Some(v) if v > 0.0 && v.is_finite() => v / dimension,
        _ => default / dimension,
    };

    canonicalize(
        position(placement.x, page.width),
        position(placement.y, page.height),
        extent(placement.width, page.width, DEFAULT_DRAW_WIDTH),
        extent(placement.height, page.height, DEFAULT_DRAW_HEIGHT),
    )
}

/// Resolve a stored placement to the absolute box the compositor draws.
///
/// Each field is judged on its own: positions in [0, 1] and sizes in (0, 1]
/// are ratios of the page, everything else is taken as points. The box is
/// kept within the right and bottom edges. Returns `None` when a position is
/// not a number.
pub fn resolve_absolute(placement: &Placement, page: PageSize) -> Option<AbsoluteBox> {
    let extent = |value: Option<f64>, dimension: f64, default: f64| {
        let drawn = match value {
            Some(v) if is_extent_ratio(v) => v * dimension,
            Some(v) if v > 0.0 && v.is_finite() => v,
            _ => default,
        };
        drawn.min(dimension)
    };
    let width = extent(placement.width, page.width, DEFAULT_DRAW_WIDTH);
    let height = extent(placement.height, page.height, DEFAULT_DRAW_HEIGHT);

    if !placement.x.is_finite() || !placement.y.is_finite() {
        return None;
    }
    let position = |value: f64, dimension: f64| {
        if is_position_ratio(value) {
            value * dimension
        } else {
            value
        }
    };
    let left = position(placement.x, page.width);
    let top = position(placement.y, page.height);

    Some(AbsoluteBox {
        left: clamp(left, 0.0, (page.width - width).max(0.0)),
        top: clamp(top, 0.0, (page.height - height).max(0.0)),
        width,
        height,
    })
}
