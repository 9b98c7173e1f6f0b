//! Speckle removal and small-hole filling.

use image::GrayImage;

use super::morphology::{close, open, KernelSpec};
use crate::contour::{fill_polygon, ContourTree};

/// Mask cleanup parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Structuring element used for both opening and closing.
    pub kernel: KernelSpec,
    /// Holes with contour area strictly below this (px²) are filled.
    pub max_hole_area: f64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            kernel: KernelSpec::ellipse(5),
            max_hole_area: 500.0,
        }
    }
}

/// Output of [`clean_mask`].
#[derive(Debug, Clone)]
pub struct CleanedMask {
    /// After opening + closing, before hole filling.
    pub cleaned: GrayImage,
    /// Authoritative silhouette used by every later stage.
    pub final_mask: GrayImage,
    /// Hole contours found in `cleaned`.
    pub holes_found: usize,
    /// Holes filled because they were below `max_hole_area`.
    pub holes_filled: usize,
}

/// Open, close, then fill every small hole of the cleaned mask.
pub fn clean_mask(mask: &GrayImage, config: &CleanupConfig) -> CleanedMask {
    let se = config.kernel.build();
    let cleaned = close(&open(mask, &se), &se);

    let tree = ContourTree::from_mask(&cleaned);
    let mut final_mask = cleaned.clone();
    let mut holes_found = 0;
    let mut holes_filled = 0;
    for (idx, node) in tree.holes() {
        holes_found += 1;
        let area = node.contour.area();
        if area < config.max_hole_area {
            fill_polygon(&mut final_mask, &node.contour.points, 255);
            holes_filled += 1;
        } else {
            tracing::trace!(
                "keeping hole {} (area {:.1} >= {:.1})",
                idx,
                area,
                config.max_hole_area
            );
        }
    }

    tracing::debug!(
        "mask cleanup: {} contours, {} holes, {} filled",
        tree.len(),
        holes_found,
        holes_filled
    );

    CleanedMask {
        cleaned,
        final_mask,
        holes_found,
        holes_filled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn block_with_holes() -> GrayImage {
        let mut mask = GrayImage::new(120, 80);
        for y in 5..75 {
            for x in 5..115 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        // 8x8 hole: well under 500 px² after tracing.
        for y in 30..38 {
            for x in 20..28 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        // 30x30 hole: ~900 px².
        for y in 25..55 {
            for x in 65..95 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        mask
    }

    #[test]
    fn small_hole_filled_large_hole_kept() {
        let out = clean_mask(&block_with_holes(), &CleanupConfig::default());
        assert_eq!(out.holes_found, 2);
        assert_eq!(out.holes_filled, 1);

        // Small hole is still open in the cleaned mask, solid in the final one.
        assert_eq!(out.cleaned.get_pixel(24, 34)[0], 0);
        assert_eq!(out.final_mask.get_pixel(24, 34)[0], 255);
        // Large hole stays background.
        assert_eq!(out.final_mask.get_pixel(80, 40)[0], 0);
    }

    #[test]
    fn filling_never_spreads_past_parent() {
        let out = clean_mask(&block_with_holes(), &CleanupConfig::default());
        for (x, y, p) in out.final_mask.enumerate_pixels() {
            if p[0] != 0 {
                assert!((5..115).contains(&x) && (5..75).contains(&y));
            }
        }
    }

    #[test]
    fn speckles_disappear() {
        let mut mask = block_with_holes();
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(117, 2, Luma([255]));
        let out = clean_mask(&mask, &CleanupConfig::default());
        assert_eq!(out.final_mask.get_pixel(1, 1)[0], 0);
        assert_eq!(out.final_mask.get_pixel(117, 2)[0], 0);
    }

    #[test]
    fn threshold_zero_fills_nothing() {
        let config = CleanupConfig {
            max_hole_area: 0.0,
            ..Default::default()
        };
        let out = clean_mask(&block_with_holes(), &config);
        assert_eq!(out.holes_filled, 0);
        assert_eq!(out.final_mask, out.cleaned);
    }

    #[test]
    fn empty_mask_stays_empty() {
        let out = clean_mask(&GrayImage::new(16, 16), &CleanupConfig::default());
        assert_eq!(out.holes_found, 0);
        assert!(out.final_mask.pixels().all(|p| p[0] == 0));
    }
}
