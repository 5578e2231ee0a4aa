//! Entropy-style grid search for the most interesting crop.
//!
//! The "entropy" of a region is approximated by the mean of `R + G + B`
//! over a sparse sample grid, so brighter regions win. Candidates earn a
//! bonus for every rule-of-thirds intersection of the source they contain.
//! The first candidate in row-major order wins ties.

use super::calculations::{grid_offsets, thirds_intersections};
use super::params::{CropRect, CropResult};
use image::RgbImage;

pub const STRATEGY_NAME: &str = "entropy";

/// Score bonus per contained thirds intersection.
pub const THIRDS_BONUS: f64 = 10.0;

/// Tuning for [`find_best_crop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Stride between candidate offsets.
    pub grid_step: u32,
    /// Stride between sampled pixels inside a candidate.
    pub sample_step: u32,
    pub rule_of_thirds: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            grid_step: 20,
            sample_step: 10,
            rule_of_thirds: true,
        }
    }
}

/// Mean `R + G + B` of the pixels sampled every `step` px inside `rect`.
///
/// Samples falling outside the image are skipped; a region with no samples
/// scores zero.
pub fn region_score(img: &RgbImage, rect: &CropRect, step: u32) -> f64 {
    let step = step.max(1) as usize;
    let (img_w, img_h) = img.dimensions();
    let mut sum: u64 = 0;
    let mut samples: u64 = 0;

    for py in (rect.y..rect.bottom()).step_by(step) {
        if py >= img_h {
            break;
        }
        for px in (rect.x..rect.right()).step_by(step) {
            if px >= img_w {
                break;
            }
            let [r, g, b] = img.get_pixel(px, py).0;
            sum += r as u64 + g as u64 + b as u64;
            samples += 1;
        }
    }

    if samples == 0 {
        0.0
    } else {
        sum as f64 / samples as f64
    }
}

/// Search every grid offset for the `crop`-sized region with the highest score.
///
/// The running maximum starts at zero with offset (0, 0) and only a strictly
/// greater score replaces it, so an all-black source keeps the origin.
pub fn find_best_crop(img: &RgbImage, crop: (u32, u32), params: SearchParams) -> CropResult {
    let (img_w, img_h) = img.dimensions();
    let max_x = img_w.saturating_sub(crop.0);
    let max_y = img_h.saturating_sub(crop.1);

    let mut best = (0u32, 0u32);
    let mut best_score = 0.0f64;

    for y in grid_offsets(max_y, params.grid_step) {
        for x in grid_offsets(max_x, params.grid_step) {
            let rect = CropRect {
                x,
                y,
                width: crop.0,
                height: crop.1,
            };
            let mut score = region_score(img, &rect, params.sample_step);
            if params.rule_of_thirds {
                score += THIRDS_BONUS * thirds_intersections(&rect, (img_w, img_h)) as f64;
            }
            if score > best_score {
                best_score = score;
                best = (x, y);
            }
        }
    }

    CropResult {
        rect: CropRect {
            x: best.0.min(max_x),
            y: best.1.min(max_y),
            width: crop.0,
            height: crop.1,
        },
        strategy: STRATEGY_NAME,
        score: best_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn uniform(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    // =========================================================================
    // region_score
    // =========================================================================

    #[test]
    fn region_score_is_mean_channel_sum() {
        let img = uniform(100, 100, 10);
        let rect = CropRect {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        assert_eq!(region_score(&img, &rect, 10), 30.0);
    }

    #[test]
    fn region_score_skips_out_of_bounds_samples() {
        let img = uniform(15, 15, 1);
        let rect = CropRect {
            x: 10,
            y: 10,
            width: 100,
            height: 100,
        };
        // Only (10, 10) is inside the image
        assert_eq!(region_score(&img, &rect, 10), 3.0);
    }

    #[test]
    fn region_score_empty_region_is_zero() {
        let img = uniform(10, 10, 255);
        let rect = CropRect {
            x: 50,
            y: 50,
            width: 10,
            height: 10,
        };
        assert_eq!(region_score(&img, &rect, 10), 0.0);
    }

    // =========================================================================
    // find_best_crop
    // =========================================================================

    #[test]
    fn uniform_source_keeps_first_offset() {
        let img = uniform(300, 200, 128);
        let result = find_best_crop(&img, (200, 200), SearchParams::default());
        assert_eq!((result.rect.x, result.rect.y), (0, 0));
        assert_eq!((result.rect.width, result.rect.height), (200, 200));
        assert_eq!(result.strategy, "entropy");
    }

    #[test]
    fn black_source_without_bonus_keeps_origin() {
        let img = uniform(300, 200, 0);
        let params = SearchParams {
            rule_of_thirds: false,
            ..SearchParams::default()
        };
        let result = find_best_crop(&img, (200, 200), params);
        assert_eq!((result.rect.x, result.rect.y), (0, 0));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn bright_right_side_wins() {
        // Left half black, right half white
        let img = RgbImage::from_fn(400, 100, |x, _| {
            if x >= 200 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let params = SearchParams {
            rule_of_thirds: false,
            ..SearchParams::default()
        };
        let result = find_best_crop(&img, (100, 100), params);
        assert!(result.rect.x >= 200, "picked x = {}", result.rect.x);
        assert_eq!(result.rect.y, 0);
        assert_eq!(result.score, 765.0);
    }

    #[test]
    fn full_frame_crop_has_single_candidate() {
        let img = uniform(120, 90, 50);
        let result = find_best_crop(&img, (120, 90), SearchParams::default());
        assert_eq!((result.rect.x, result.rect.y), (0, 0));
        // 150 mean + 4 intersections
        assert_eq!(result.score, 190.0);
    }

    #[test]
    fn result_stays_within_source() {
        let img = uniform(333, 211, 90);
        let result = find_best_crop(&img, (211, 211), SearchParams::default());
        assert!(result.rect.fits_within(333, 211));
    }
}
