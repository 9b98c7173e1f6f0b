//! Euclidean distance transform of a binary mask.
//!
//! Foreground (non-zero) pixels receive the distance to the nearest zero
//! pixel; zero pixels receive 0. Pixels outside the frame do not count as
//! zeros, so a mask without any zero pixel is infinitely deep everywhere.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

/// Distance field, one `f32` per pixel.
pub type DistanceField = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Euclidean distance of every foreground pixel to the nearest background pixel.
pub fn euclidean_distance_transform(mask: &GrayImage) -> DistanceField {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return DistanceField::new(w, h);
    }
    // imageproc measures the distance to the nearest non-zero pixel.
    let zeros = GrayImage::from_fn(w, h, |x, y| {
        Luma([if mask.get_pixel(x, y)[0] == 0 { 255 } else { 0 }])
    });
    let squared = euclidean_squared_distance_transform(&zeros);
    DistanceField::from_fn(w, h, |x, y| Luma([squared.get_pixel(x, y)[0].sqrt() as f32]))
}

/// Largest finite value in the field, or `None` when every value is infinite or the field is empty.
pub fn max_finite(field: &DistanceField) -> Option<f32> {
    field
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold(None, |acc, d| Some(acc.map_or(d, |m: f32| m.max(d))))
}
