//! Synthetic frames and masks shared by unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Blue backdrop inside the default background key.
pub(crate) const BACKDROP: Rgb<u8> = Rgb([30, 60, 200]);
/// Warm object colour well outside the default key.
pub(crate) const SHRIMP: Rgb<u8> = Rgb([230, 150, 110]);

fn inside(x: u32, y: u32, discs: &[([f32; 2], f32)]) -> bool {
    discs.iter().any(|&([cx, cy], r)| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        dx * dx + dy * dy <= r * r
    })
}

/// Binary mask with filled discs `(center, radius)`.
pub(crate) fn disc_mask(w: u32, h: u32, discs: &[([f32; 2], f32)]) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        Luma([if inside(x, y, discs) { 255 } else { 0 }])
    })
}

/// Colour frame with filled discs on the blue backdrop.
pub(crate) fn disc_frame(w: u32, h: u32, discs: &[([f32; 2], f32)]) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        if inside(x, y, discs) {
            SHRIMP
        } else {
            BACKDROP
        }
    })
}

/// Paint an axis-aligned rectangle `[x0, x1) × [y0, y1)` onto a frame.
pub(crate) fn paint_rect(frame: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x, y, color);
        }
    }
}
