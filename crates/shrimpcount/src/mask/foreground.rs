//! Background keying: everything outside the key colour range is foreground.

use image::{GrayImage, RgbImage};

use crate::color::rgb_to_hsv;

/// Closed HSV interval that identifies backdrop pixels.
///
/// Hue uses the halved `[0, 180)` range, saturation and value `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackgroundKey {
    /// Inclusive lower bound `[h, s, v]`.
    pub lower: [u8; 3],
    /// Inclusive upper bound `[h, s, v]`.
    pub upper: [u8; 3],
}

impl BackgroundKey {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Returns a reason when the interval is empty or the hue is out of range.
    pub fn check(&self) -> Result<(), String> {
        for (c, name) in ["hue", "saturation", "value"].iter().enumerate() {
            if self.lower[c] > self.upper[c] {
                return Err(format!(
                    "{} lower bound {} exceeds upper bound {}",
                    name, self.lower[c], self.upper[c]
                ));
            }
        }
        if self.lower[0] > 180 {
            return Err(format!("hue lower bound {} is above 180", self.lower[0]));
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

impl Default for BackgroundKey {
    /// Blue backdrop.
    fn default() -> Self {
        Self {
            lower: [90, 50, 50],
            upper: [140, 255, 255],
        }
    }
}

/// Build the object mask: key-coloured pixels → 0, everything else → 255.
pub fn build_foreground_mask(frame: &RgbImage, key: &BackgroundKey) -> GrayImage {
    let (w, h) = frame.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (dst, px) in mask.pixels_mut().zip(frame.pixels()) {
        if !key.contains(rgb_to_hsv(px.0)) {
            dst.0[0] = 255;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn blue_backdrop_is_background_and_orange_is_foreground() {
        let mut frame = RgbImage::from_pixel(4, 2, Rgb([30, 60, 200]));
        frame.put_pixel(1, 1, Rgb([230, 120, 60]));
        let mask = build_foreground_mask(&frame, &BackgroundKey::default());
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 1);
    }

    #[test]
    fn dark_and_grey_pixels_fall_outside_the_key() {
        // Low value or low saturation fails the lower bound.
        let frame = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([5, 5, 20])
            } else {
                Rgb([120, 120, 125])
            }
        });
        let mask = build_foreground_mask(&frame, &BackgroundKey::default());
        assert!(mask.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn key_check_rejects_inverted_interval() {
        let key = BackgroundKey::new([140, 50, 50], [90, 255, 255]);
        assert!(key.check().is_err());
        assert!(BackgroundKey::default().check().is_ok());
    }

    #[test]
    fn empty_frame_gives_empty_mask() {
        let mask = build_foreground_mask(&RgbImage::new(0, 0), &BackgroundKey::default());
        assert_eq!(mask.dimensions(), (0, 0));
    }
}
