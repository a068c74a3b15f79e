//! Pure geometry for every transform mode.
//!
//! All functions here are pure and testable without any I/O or images.
//! Ratios between dimensions are compared by cross-multiplying integers, so
//! the results are exact and do not drift with floating-point rounding.
//! Only [`region_from_ratios`] works in floating point, because its inputs
//! are fractional.

use super::params::Anchor;

/// An axis-aligned rectangle in pixel space.
///
/// Positions are signed: a scale-to-cover placement routinely starts left of
/// or above the canvas, and an unchecked ratio region can start anywhere.
/// Sizes are signed for the same reason (negative ratios produce them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i64 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlap with `other`, or `None` when they do not touch.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y));
        (!rect.is_empty()).then_some(rect)
    }
}

/// `n / d` rounded to nearest, ties to even.
fn div_round_even(n: u64, d: u64) -> u64 {
    let q = n / d;
    let r = n % d;
    match (2 * r).cmp(&d) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
        std::cmp::Ordering::Less => q,
    }
}

/// Scale factor that brings the longer source edge to `max_dimension`.
///
/// No upscaling policy is applied here; see [`fit_within_max`].
pub fn scale_factor_to_fit(source_w: u32, source_h: u32, max_dimension: u32) -> f64 {
    max_dimension as f64 / source_w.max(source_h) as f64
}

/// Output size for Raw mode bounded by a square `max_dimension`.
///
/// If the source is already smaller than `max_dimension` on both axes, the
/// longer source edge becomes the effective bound, so small images are never
/// enlarged.
///
/// ```
/// # use thumbcache::imaging::calculations::fit_within_max;
/// assert_eq!(fit_within_max((800, 600), 50), (50, 38));
/// assert_eq!(fit_within_max((40, 30), 50), (40, 30));
/// ```
pub fn fit_within_max(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    let bound = if w < max_dimension && h < max_dimension {
        longer
    } else {
        max_dimension
    };

    let scale = |edge: u32| div_round_even(edge as u64 * bound as u64, longer as u64) as u32;
    (scale(w).max(1), scale(h).max(1))
}

/// Output size for Raw mode bounded by an explicit `max_w` x `max_h` box.
///
/// The tighter axis wins. Sources smaller than the box on both axes keep
/// their size.
pub fn fit_within_box(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (max_w, max_h) = bounds;
    if w < max_w && h < max_h {
        return (w, h);
    }

    // max_w / w <= max_h / h  <=>  max_w * h <= max_h * w
    let (w64, h64) = (w as u64, h as u64);
    if max_w as u64 * h64 <= max_h as u64 * w64 {
        let out_h = div_round_even(h64 * max_w as u64, w64) as u32;
        (max_w, out_h.max(1))
    } else {
        let out_w = div_round_even(w64 * max_h as u64, h64) as u32;
        (out_w.max(1), max_h)
    }
}

/// Size used when preparing an upload for the web: scale down so the longer
/// edge equals `max_dimension`, truncating fractional pixels. Never upscales.
pub fn fit_for_web(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_dimension {
        return (w, h);
    }
    let scale = |edge: u32| (edge as u64 * max_dimension as u64 / longer as u64) as u32;
    (scale(w).max(1), scale(h).max(1))
}

/// Letterboxed destination for Scale mode.
///
/// The axis with the smaller fit ratio determines the scale; the scaled image
/// is centred on the other axis with padding `(target - scaled) / 2`, rounded
/// toward zero.
///
/// ```
/// # use thumbcache::imaging::calculations::{dest_rect_for_scale, Rect};
/// // 800x600 into 200x100: height-limited, 133px wide, 33px bands
/// assert_eq!(dest_rect_for_scale((200, 100), (800, 600)), Rect::new(33, 0, 133, 100));
/// ```
pub fn dest_rect_for_scale(target: (u32, u32), source: (u32, u32)) -> Rect {
    let (tw, th) = (target.0 as u64, target.1 as u64);
    let (sw, sh) = (source.0 as u64, source.1 as u64);

    // height ratio < width ratio  <=>  th * sw < tw * sh
    if th * sw < tw * sh {
        let dest_w = (sw * th / sh).max(1);
        let x = (tw as i64 - dest_w as i64) / 2;
        Rect::new(x, 0, dest_w as i64, th as i64)
    } else {
        let dest_h = (sh * tw / sw).max(1);
        let y = (th as i64 - dest_h as i64) / 2;
        Rect::new(0, y, tw as i64, dest_h as i64)
    }
}

/// Scale-to-cover placement for Crop mode.
///
/// The larger fit ratio wins so the scaled source covers the whole target.
/// The overflowing axis is then aligned according to `anchor`: Top/Bottom
/// only apply when the overflow is vertical, Left/Right only when it is
/// horizontal, and anything else centres. The returned rectangle extends
/// past the target bounds; clipping is the drawing step's job.
///
/// ```
/// # use thumbcache::imaging::calculations::{crop_rect_for_anchor, Rect};
/// # use thumbcache::imaging::Anchor;
/// assert_eq!(
///     crop_rect_for_anchor((200, 100), (800, 600), Anchor::Center),
///     Rect::new(0, -25, 200, 150)
/// );
/// ```
pub fn crop_rect_for_anchor(target: (u32, u32), source: (u32, u32), anchor: Anchor) -> Rect {
    let (tw, th) = (target.0 as u64, target.1 as u64);
    let (sw, sh) = (source.0 as u64, source.1 as u64);

    if th * sw < tw * sh {
        // Width ratio is larger: scale by it, overflow vertically.
        let dest_w = tw as i64;
        let dest_h = div_round_even(sh * tw, sw) as i64;
        let y = match anchor {
            Anchor::Top => 0,
            Anchor::Bottom => th as i64 - dest_h,
            _ => (th as i64 - dest_h) / 2,
        };
        Rect::new(0, y, dest_w, dest_h)
    } else {
        let dest_w = div_round_even(sw * th, sh) as i64;
        let dest_h = th as i64;
        let x = match anchor {
            Anchor::Left => 0,
            Anchor::Right => tw as i64 - dest_w,
            _ => (tw as i64 - dest_w) / 2,
        };
        Rect::new(x, 0, dest_w, dest_h)
    }
}

/// Bound on any pixel offset or size derived from a ratio (2^40).
const REGION_LIMIT: f64 = 1_099_511_627_776.0;

/// Source region addressed by fractional ratios.
///
/// Each component is `round(ratio * source_edge)`. Nothing is clamped to the source: a
/// ratio set that sums past 1.0 yields a region partly or wholly outside the
/// source, and negative ratios yield negative offsets or sizes. Infinite or
/// huge ratios saturate at ±2^40 pixels; NaN becomes 0.
///
/// ```
/// # use thumbcache::imaging::calculations::{region_from_ratios, Rect};
/// assert_eq!(
///     region_from_ratios((400, 400), 0.25, 0.25, 0.5, 0.5),
///     Rect::new(100, 100, 200, 200)
/// );
/// ```
pub fn region_from_ratios(
    source: (u32, u32),
    left_ratio: f64,
    top_ratio: f64,
    width_ratio: f64,
    height_ratio: f64,
) -> Rect {
    let (sw, sh) = (source.0 as f64, source.1 as f64);
    let px = |ratio: f64, edge: f64| {
        (ratio * edge)
            .round_ties_even()
            .clamp(-REGION_LIMIT, REGION_LIMIT) as i64
    };
    Rect::new(
        px(left_ratio, sw),
        px(top_ratio, sh),
        px(width_ratio, sw),
        px(height_ratio, sh),
    )
}
