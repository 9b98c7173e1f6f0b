use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Paint the interior and outline of a closed polygon with `value`.
///
/// A repeated closing point is dropped before filling. Polygons that collapse
/// to a single vertex mark that pixel. Points outside the mask are clipped.
pub fn fill_polygon(mask: &mut GrayImage, points: &[[i32; 2]], value: u8) {
    let (w, h) = mask.dimensions();
    if points.is_empty() || w == 0 || h == 0 {
        return;
    }

    let mut poly: Vec<Point<i32>> = points.iter().map(|&[x, y]| Point::new(x, y)).collect();
    let first = poly[0];
    while poly.len() > 1 && poly[poly.len() - 1] == first {
        poly.pop();
    }

    if poly.len() == 1 {
        if first.x >= 0 && first.y >= 0 && (first.x as u32) < w && (first.y as u32) < h {
            mask.put_pixel(first.x as u32, first.y as u32, Luma([value]));
        }
        return;
    }
    draw_polygon_mut(mask, &poly, Luma([value]));
}
