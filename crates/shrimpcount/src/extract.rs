//! Region extraction: label footprints → counted outlines.

use std::collections::BTreeMap;

use image::GrayImage;

use crate::contour::{BoundingBox, ContourTree};
use crate::watershed::{Label, LabelMap};

/// Region acceptance parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Outlines must enclose strictly more than this area (px²) to be counted.
    pub min_area: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { min_area: 3000.0 }
    }
}

/// One counted object.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    /// 1-based position in extraction order.
    pub index: usize,
    /// Id of the grown region the outline came from.
    pub label: u32,
    /// Closed outline in frame coordinates.
    pub contour: Vec<[i32; 2]>,
    /// Shoelace area of `contour`.
    pub area: f64,
    pub bbox: BoundingBox,
    /// Area centroid; `None` when the outline encloses no area.
    pub centroid: Option<[f64; 2]>,
}

/// Output of [`extract_regions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub regions: Vec<Region>,
    /// External outlines dropped by the area threshold.
    pub rejected: usize,
}

/// Inclusive pixel extent of every region id.
fn region_extents(label_map: &LabelMap) -> BTreeMap<u32, [u32; 4]> {
    let mut extents: BTreeMap<u32, [u32; 4]> = BTreeMap::new();
    let w = label_map.width();
    for (i, label) in label_map.labels().iter().enumerate() {
        let Label::Region(id) = *label else {
            continue;
        };
        let x = i as u32 % w;
        let y = i as u32 / w;
        extents
            .entry(id)
            .and_modify(|e| {
                e[0] = e[0].min(x);
                e[1] = e[1].min(y);
                e[2] = e[2].max(x);
                e[3] = e[3].max(y);
            })
            .or_insert([x, y, x, y]);
    }
    extents
}

/// Trace every grown region inside the silhouette and keep the large outlines.
///
/// Regions are visited in ascending id order. Each footprint is the region's
/// pixels intersected with `final_mask`, traced on a crop padded by one pixel
/// so outlines never touch the crop border. Only external outlines are
/// considered; holes inside a footprint do not produce regions.
pub fn extract_regions(
    label_map: &LabelMap,
    final_mask: &GrayImage,
    config: &ExtractConfig,
) -> Extraction {
    assert_eq!(
        label_map.dimensions(),
        final_mask.dimensions(),
        "label map and mask must have equal dimensions"
    );

    let mut out = Extraction::default();
    for (id, [x0, y0, x1, y1]) in region_extents(label_map) {
        let cw = x1 - x0 + 3;
        let ch = y1 - y0 + 3;
        let mut footprint = GrayImage::new(cw, ch);
        let mut any = false;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if label_map.get(x, y) == Label::Region(id) && final_mask.get_pixel(x, y)[0] != 0 {
                    footprint.put_pixel(x - x0 + 1, y - y0 + 1, image::Luma([255]));
                    any = true;
                }
            }
        }
        if !any {
            tracing::trace!("region {} lies outside the silhouette", id);
            continue;
        }

        let tree = ContourTree::from_mask(&footprint);
        for outline in tree.external() {
            let area = outline.area();
            if area <= config.min_area {
                out.rejected += 1;
                tracing::trace!(
                    "region {}: fragment area {:.1} <= {:.1}",
                    id,
                    area,
                    config.min_area
                );
                continue;
            }
            let mut contour = outline.clone();
            contour.translate(x0 as i32 - 1, y0 as i32 - 1);
            let Some(bbox) = contour.bounding_box() else {
                continue;
            };
            let centroid = contour.moments().centroid();
            let index = out.regions.len() + 1;
            tracing::trace!("region {} -> object {} (area {:.1})", id, index, area);
            out.regions.push(Region {
                index,
                label: id,
                contour: contour.points,
                area,
                bbox,
                centroid,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn map_with_rects(w: u32, h: u32, rects: &[(i32, [u32; 4])]) -> LabelMap {
        let mut raw = vec![Label::RAW_BACKGROUND; (w * h) as usize];
        for &(id, [rx0, ry0, rx1, ry1]) in rects {
            for y in ry0..ry1 {
                for x in rx0..rx1 {
                    raw[(y * w + x) as usize] = id;
                }
            }
        }
        LabelMap::from_raw(w, h, &raw).expect("size")
    }

    fn full_mask(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    #[test]
    fn large_regions_counted_small_rejected() {
        let map = map_with_rects(
            200,
            120,
            &[(2, [10, 10, 80, 80]), (3, [100, 10, 120, 30]), (4, [120, 40, 190, 110])],
        );
        let ex = extract_regions(&map, &full_mask(200, 120), &ExtractConfig::default());
        assert_eq!(ex.regions.len(), 2);
        assert_eq!(ex.rejected, 1);

        let first = &ex.regions[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.label, 2);
        assert_eq!(first.bbox, BoundingBox { x: 10, y: 10, w: 70, h: 70 });
        assert!((first.area - 69.0 * 69.0).abs() < 1e-9);
        let c = first.centroid.expect("centroid");
        assert!((c[0] - 44.5).abs() < 1e-9 && (c[1] - 44.5).abs() < 1e-9);

        assert_eq!(ex.regions[1].index, 2);
        assert_eq!(ex.regions[1].label, 4);
    }

    #[test]
    fn threshold_is_strict() {
        // 61x61 block traces to a 60x60 polygon: area exactly 3600.
        let map = map_with_rects(80, 80, &[(2, [5, 5, 66, 66])]);
        let at = ExtractConfig { min_area: 3600.0 };
        assert!(extract_regions(&map, &full_mask(80, 80), &at).regions.is_empty());
        let below = ExtractConfig { min_area: 3599.0 };
        assert_eq!(extract_regions(&map, &full_mask(80, 80), &below).regions.len(), 1);
    }

    #[test]
    fn footprint_is_clipped_by_the_mask() {
        let map = map_with_rects(100, 100, &[(2, [0, 0, 100, 100])]);
        let mut mask = GrayImage::new(100, 100);
        for y in 20..90 {
            for x in 20..90 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let ex = extract_regions(&map, &mask, &ExtractConfig::default());
        assert_eq!(ex.regions.len(), 1);
        assert_eq!(ex.regions[0].bbox, BoundingBox { x: 20, y: 20, w: 70, h: 70 });
    }

    #[test]
    fn split_footprint_yields_one_region_per_piece() {
        let map = map_with_rects(200, 80, &[(2, [0, 0, 200, 80])]);
        let mut mask = GrayImage::new(200, 80);
        for y in 5..75 {
            for x in (5..75).chain(110..180) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let ex = extract_regions(&map, &mask, &ExtractConfig::default());
        assert_eq!(ex.regions.len(), 2);
        assert!(ex.regions.iter().all(|r| r.label == 2));
        assert_eq!(
            ex.regions.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn no_regions_in_background_only_map() {
        let map = map_with_rects(30, 30, &[]);
        let ex = extract_regions(&map, &full_mask(30, 30), &ExtractConfig::default());
        assert_eq!(ex, Extraction::default());
    }
}
