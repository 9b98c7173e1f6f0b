//! Annotation instructions for counted regions and their rasterisation.
//!
//! Counting produces a list of [`Overlay`] instructions rather than pixels so
//! a presentation layer can draw text with whatever font it has. The shapes
//! can also be burnt into a frame with [`render_overlays`].

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::contour::BoundingBox;
use crate::extract::Region;
use crate::watershed::{Label, LabelMap};

/// Colours (RGB) and sizes of the annotation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub contour_color: [u8; 3],
    pub bbox_color: [u8; 3],
    pub centroid_color: [u8; 3],
    pub text_color: [u8; 3],
    /// Stroke width of outlines and boxes, in pixels.
    pub line_thickness: u32,
    pub centroid_radius: i32,
    /// Offset of the index label from the centroid.
    pub label_offset: [i32; 2],
    /// Anchor of the running total.
    pub banner_origin: [i32; 2],
    pub banner_prefix: String,
    pub draw_contours: bool,
    pub draw_boxes: bool,
    pub draw_centroids: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            contour_color: [0, 255, 0],
            bbox_color: [0, 0, 255],
            centroid_color: [255, 0, 0],
            text_color: [255, 0, 0],
            line_thickness: 2,
            centroid_radius: 5,
            label_offset: [-10, -10],
            banner_origin: [10, 30],
            banner_prefix: "Total: ".to_string(),
            draw_contours: true,
            draw_boxes: true,
            draw_centroids: true,
        }
    }
}

/// One drawing instruction in frame coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    Polyline {
        points: Vec<[i32; 2]>,
        closed: bool,
        color: [u8; 3],
        thickness: u32,
    },
    Rectangle {
        bbox: BoundingBox,
        color: [u8; 3],
        thickness: u32,
    },
    Disc {
        center: [i32; 2],
        radius: i32,
        color: [u8; 3],
    },
    Text {
        text: String,
        origin: [i32; 2],
        color: [u8; 3],
    },
}

/// Build the annotation for one counted frame.
///
/// Per region: outline, bounding box, centroid disc and index label (the
/// last two only when the centroid exists). A single banner with the total
/// closes the list.
pub fn overlay_instructions(
    regions: &[Region],
    object_count: usize,
    style: &OverlayStyle,
) -> Vec<Overlay> {
    let mut out = Vec::with_capacity(regions.len() * 4 + 1);
    for region in regions {
        if style.draw_contours {
            out.push(Overlay::Polyline {
                points: region.contour.clone(),
                closed: true,
                color: style.contour_color,
                thickness: style.line_thickness,
            });
        }
        if style.draw_boxes {
            out.push(Overlay::Rectangle {
                bbox: region.bbox,
                color: style.bbox_color,
                thickness: style.line_thickness,
            });
        }
        if let Some([cx, cy]) = region.centroid {
            // Truncate like integer pixel addressing does.
            let center = [cx as i32, cy as i32];
            if style.draw_centroids {
                out.push(Overlay::Disc {
                    center,
                    radius: style.centroid_radius,
                    color: style.centroid_color,
                });
            }
            out.push(Overlay::Text {
                text: region.index.to_string(),
                origin: [
                    center[0] + style.label_offset[0],
                    center[1] + style.label_offset[1],
                ],
                color: style.text_color,
            });
        }
    }
    out.push(Overlay::Text {
        text: format!("{}{}", style.banner_prefix, object_count),
        origin: style.banner_origin,
        color: style.text_color,
    });
    out
}

fn stroke_segment(img: &mut RgbImage, a: [i32; 2], b: [i32; 2], color: Rgb<u8>, thickness: u32) {
    let t = thickness.max(1) as i32;
    for oy in 0..t {
        for ox in 0..t {
            draw_line_segment_mut(
                img,
                ((a[0] + ox) as f32, (a[1] + oy) as f32),
                ((b[0] + ox) as f32, (b[1] + oy) as f32),
                color,
            );
        }
    }
}

/// Copy of `frame` with every non-text instruction drawn on it.
pub fn render_overlays(frame: &RgbImage, overlays: &[Overlay]) -> RgbImage {
    let mut img = frame.clone();
    for overlay in overlays {
        match overlay {
            Overlay::Polyline {
                points,
                closed,
                color,
                thickness,
            } => {
                let color = Rgb(*color);
                match points.as_slice() {
                    [] => {}
                    [p] => stroke_segment(&mut img, *p, *p, color, *thickness),
                    _ => {
                        for pair in points.windows(2) {
                            stroke_segment(&mut img, pair[0], pair[1], color, *thickness);
                        }
                        if *closed {
                            let (first, last) = (points[0], points[points.len() - 1]);
                            stroke_segment(&mut img, last, first, color, *thickness);
                        }
                    }
                }
            }
            Overlay::Rectangle {
                bbox,
                color,
                thickness,
            } => {
                for k in 0..(*thickness).max(1) {
                    let (w, h) = (bbox.w as i64 - 2 * k as i64, bbox.h as i64 - 2 * k as i64);
                    if w <= 0 || h <= 0 {
                        break;
                    }
                    let rect = Rect::at(bbox.x + k as i32, bbox.y + k as i32).of_size(w as u32, h as u32);
                    draw_hollow_rect_mut(&mut img, rect, Rgb(*color));
                }
            }
            Overlay::Disc {
                center,
                radius,
                color,
            } => {
                draw_filled_circle_mut(&mut img, (center[0], center[1]), *radius, Rgb(*color));
            }
            Overlay::Text { .. } => {}
        }
    }
    img
}

/// Deterministic display colour for a region id.
pub fn region_color(id: u32) -> [u8; 3] {
    let h = id.wrapping_mul(2_654_435_761);
    [
        64 + (h & 0xBF) as u8,
        64 + ((h >> 8) & 0xBF) as u8,
        64 + ((h >> 16) & 0xBF) as u8,
    ]
}

/// False-colour rendering of a label map.
///
/// Boundaries are red, background black, unreached pixels dark grey, and
/// every region gets [`region_color`] of its id.
pub fn colorize_label_map(label_map: &LabelMap) -> RgbImage {
    let (w, h) = label_map.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        Rgb(match label_map.get(x, y) {
            Label::Boundary => [255, 0, 0],
            Label::Background => [0, 0, 0],
            Label::Unassigned => [48, 48, 48],
            Label::Region(id) => region_color(id),
        })
    })
}
