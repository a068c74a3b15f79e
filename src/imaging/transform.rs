//! The four transform modes, dispatched through [`apply`].
//!
//! Every mode allocates a fresh output raster. Resampling is Catmull-Rom
//! (bicubic) via `image::imageops::resize`, whose kernel clamps sample
//! coordinates to the image it is given. Drawing a sub-region therefore
//! crops first and resamples the crop, so pixels at a cut edge extend
//! outward instead of blending with whatever lies past the cut.

use super::calculations::{
    Rect, crop_rect_for_anchor, dest_rect_for_scale, fit_for_web, fit_within_box, fit_within_max,
    region_from_ratios,
};
use super::params::{RawBounds, Rgb, TransformRequest};
use super::raster::Raster;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const FILTER: FilterType = FilterType::CatmullRom;

/// Produce the target raster for `request` from `source`.
///
/// The request is assumed to have passed [`TransformRequest::validate`].
/// Output resolution metadata is carried over from the source.
pub fn apply(source: &Raster, request: &TransformRequest) -> Raster {
    let image = match *request {
        TransformRequest::Raw(bounds) => raw(&source.image, bounds),
        TransformRequest::Scale(p) => scale(
            &source.image,
            (p.width, p.height),
            p.background.unwrap_or(Rgb::SENTINEL),
        ),
        TransformRequest::Crop(p) => {
            let dest = crop_rect_for_anchor((p.width, p.height), source.dimensions(), p.anchor);
            let mut canvas = RgbaImage::from_pixel(p.width, p.height, Rgb::SENTINEL.to_rgba());
            draw_region(&mut canvas, &source.image, full_rect(&source.image), dest);
            canvas
        }
        TransformRequest::SpecifiedCrop(p) => {
            let r = p.region;
            let region =
                region_from_ratios(source.dimensions(), r.left, r.top, r.width, r.height);
            let mut canvas = RgbaImage::from_pixel(p.width, p.height, Rgba([0, 0, 0, 0]));
            let dest = Rect::new(0, 0, p.width as i64, p.height as i64);
            draw_region(&mut canvas, &source.image, region, dest);
            canvas
        }
    };

    Raster {
        image,
        resolution: source.resolution,
    }
}

/// Downscale so the longer edge fits `max_dimension`; used when preparing
/// uploads for the web. Never enlarges.
pub fn fit_web(source: &Raster, max_dimension: u32) -> Raster {
    let (w, h) = fit_for_web(source.dimensions(), max_dimension);
    Raster {
        image: resized(&source.image, w, h),
        resolution: source.resolution,
    }
}

fn raw(source: &RgbaImage, bounds: RawBounds) -> RgbaImage {
    let (w, h) = match bounds {
        RawBounds::Unbounded => source.dimensions(),
        RawBounds::MaxDimension(max) => fit_within_max(source.dimensions(), max),
        RawBounds::MaxBox {
            max_width,
            max_height,
        } => fit_within_box(source.dimensions(), (max_width, max_height)),
    };
    resized(source, w, h)
}

fn scale(source: &RgbaImage, target: (u32, u32), background: Rgb) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(target.0, target.1, background.to_rgba());
    let dest = dest_rect_for_scale(target, source.dimensions());
    draw_region(&mut canvas, source, full_rect(source), dest);
    canvas
}

fn full_rect(image: &RgbaImage) -> Rect {
    Rect::new(0, 0, image.width() as i64, image.height() as i64)
}

fn resized(source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if source.dimensions() == (width, height) {
        source.clone()
    } else {
        imageops::resize(source, width, height, FILTER)
    }
}

/// Resample `src` (in source coordinates) onto `dest` (in canvas
/// coordinates) and composite with source-copy semantics.
///
/// Parts of `src` that fall outside the source are skipped, leaving the
/// canvas untouched there. Parts of `dest` outside the canvas are clipped
/// before resampling: only the source pixels that land on the canvas are
/// cut and scaled. Degenerate rectangles draw nothing.
fn draw_region(canvas: &mut RgbaImage, source: &RgbaImage, src: Rect, dest: Rect) {
    if src.is_empty() || dest.is_empty() {
        return;
    }
    let Some(visible) = src.intersect(&full_rect(source)) else {
        return;
    };

    // Where the visible part of `src` lands, proportionally, in `dest`.
    let dx0 = dest.x + scale_len(visible.x - src.x, dest.width, src.width);
    let dy0 = dest.y + scale_len(visible.y - src.y, dest.height, src.height);
    let dx1 = dest.x + scale_len(visible.right() - src.x, dest.width, src.width);
    let dy1 = dest.y + scale_len(visible.bottom() - src.y, dest.height, src.height);
    let placed = Rect::new(dx0, dy0, (dx1 - dx0).max(1), (dy1 - dy0).max(1));

    let Some(shown) = placed.intersect(&full_rect(canvas)) else {
        return;
    };

    // Source span (relative to `visible`) covering the shown canvas span,
    // widened to whole pixels, then mapped forward again.
    let (sx0, sx1) = source_span(
        shown.x - placed.x,
        shown.right() - placed.x,
        placed.width,
        visible.width,
    );
    let (sy0, sy1) = source_span(
        shown.y - placed.y,
        shown.bottom() - placed.y,
        placed.height,
        visible.height,
    );
    let px0 = placed.x + scale_len(sx0, placed.width, visible.width);
    let py0 = placed.y + scale_len(sy0, placed.height, visible.height);
    let px1 = placed.x + scale_len(sx1, placed.width, visible.width);
    let py1 = placed.y + scale_len(sy1, placed.height, visible.height);

    let cut = imageops::crop_imm(
        source,
        (visible.x + sx0) as u32,
        (visible.y + sy0) as u32,
        (sx1 - sx0) as u32,
        (sy1 - sy0) as u32,
    )
    .to_image();
    let scaled = resized(&cut, (px1 - px0).max(1) as u32, (py1 - py0).max(1) as u32);
    imageops::replace(canvas, &scaled, px0, py0);
}

/// `offset * to / from`, rounded toward negative infinity.
fn scale_len(offset: i64, to: i64, from: i64) -> i64 {
    (offset as i128 * to as i128).div_euclid(from as i128) as i64
}

/// Source pixels `[start, end)` out of `src_len` that map onto destination
/// span `[d0, d1)` of a `dest_len` placement. Never empty.
fn source_span(d0: i64, d1: i64, dest_len: i64, src_len: i64) -> (i64, i64) {
    let (src_len_w, dest_len_w) = (src_len as i128, dest_len as i128);
    let start = (d0 as i128 * src_len_w).div_euclid(dest_len_w);
    let end = (d1 as i128 * src_len_w + dest_len_w - 1).div_euclid(dest_len_w);
    let start = start.clamp(0, src_len_w - 1);
    let end = end.clamp(start + 1, src_len_w);
    (start as i64, end as i64)
}
