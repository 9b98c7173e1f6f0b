//! 8-bit RGB → HSV conversion.
//!
//! Hue is halved into `[0, 180)` so it fits a byte; saturation and value span
//! `[0, 255]`. Achromatic pixels (max == min) get hue 0.

/// Convert one RGB pixel to `[h, s, v]`.
#[inline]
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(i32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        ((diff * 255) as f32 / v as f32).round() as i32
    };

    let h = if diff == 0 {
        0.0
    } else {
        let d = diff as f32;
        let deg = if v == r {
            60.0 * (g - b) as f32 / d
        } else if v == g {
            120.0 + 60.0 * (b - r) as f32 / d
        } else {
            240.0 + 60.0 * (r - g) as f32 / d
        };
        let deg = if deg < 0.0 { deg + 360.0 } else { deg };
        deg / 2.0
    };
    // 359.x degrees would round up to 180, which is out of range.
    let h = (h.round() as i32) % 180;

    [h as u8, s.clamp(0, 255) as u8, v as u8]
}
