//! Pure calculation functions for crop and resize geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropRect;

/// Largest region of the source with the target's aspect ratio.
///
/// When the source is relatively wider than the target, the crop keeps the
/// full source height; otherwise it keeps the full source width. The other
/// side is floored. Integer arithmetic keeps equal ratios exact.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Derivative dimensions (width, height)
///
/// # Examples
/// ```
/// # use keepsake::imaging::crop_dimensions;
/// // Same 4:3 ratio: the crop is the whole source
/// assert_eq!(crop_dimensions((4000, 3000), (1200, 900)), (4000, 3000));
///
/// // Wide source into a square: full height, width trimmed
/// assert_eq!(crop_dimensions((300, 200), (100, 100)), (200, 200));
/// ```
pub fn crop_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0 as u64, source.1 as u64);
    let (tgt_w, tgt_h) = (target.0 as u64, target.1 as u64);

    let (w, h) = if src_w * tgt_h > tgt_w * src_h {
        // Source is wider: keep height
        (src_h * tgt_w / tgt_h, src_h)
    } else {
        // Source is taller or equal: keep width
        (src_w, src_w * tgt_h / tgt_w)
    };
    (w.clamp(1, src_w.max(1)) as u32, h.clamp(1, src_h.max(1)) as u32)
}

/// Scale `source` to fit inside `bounds`, preserving aspect ratio.
///
/// The ratio is `min(maxW / w, maxH / h)`, so sources smaller than the bounds
/// are scaled up. Results are truncated and never below 1 px.
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let ratio = (bounds.0 as f64 / src_w).min(bounds.1 as f64 / src_h);
    let w = (src_w * ratio) as u32;
    let h = (src_h * ratio) as u32;
    (w.max(1), h.max(1))
}

/// Centered crop rectangle; odd remainders round toward the origin.
pub fn center_crop(source: (u32, u32), crop: (u32, u32)) -> CropRect {
    CropRect {
        x: source.0.saturating_sub(crop.0) / 2,
        y: source.1.saturating_sub(crop.1) / 2,
        width: crop.0,
        height: crop.1,
    }
}

/// Offsets `0, step, 2·step, …` up to and including `max`.
pub fn grid_offsets(max: u32, step: u32) -> impl Iterator<Item = u32> {
    (0..=max).step_by(step.max(1) as usize)
}

/// Number of rule-of-thirds intersections inside `rect`, edges inclusive.
///
/// Intersections sit at 1/3 and 2/3 of the source width and height.
pub fn thirds_intersections(rect: &CropRect, source: (u32, u32)) -> u32 {
    let (w, h) = (source.0 as f64, source.1 as f64);
    let xs = [w / 3.0, 2.0 * w / 3.0];
    let ys = [h / 3.0, 2.0 * h / 3.0];
    let (left, right) = (rect.x as f64, rect.right() as f64);
    let (top, bottom) = (rect.y as f64, rect.bottom() as f64);

    xs.iter()
        .flat_map(|x| ys.iter().map(move |y| (*x, *y)))
        .filter(|(x, y)| *x >= left && *x <= right && *y >= top && *y <= bottom)
        .count() as u32
}
