//! Mask boundaries as an explicit contour tree, plus polygon geometry.
//!
//! Tracing is delegated to `imageproc::contours` (border following). The
//! result is re-expressed as a [`ContourTree`] where every node knows its
//! parent and children, so hole detection never depends on positional
//! array conventions.

mod fill;
mod geometry;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

pub use fill::fill_polygon;
pub use geometry::{bounding_box, polygon_area, polygon_moments, BoundingBox, Moments};

/// Whether a contour bounds an object or a cavity inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourKind {
    Outer,
    Hole,
}

/// Closed sequence of pixel-centre points.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<[i32; 2]>,
    pub kind: ContourKind,
}

impl Contour {
    /// Unsigned shoelace area.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        bounding_box(&self.points)
    }

    pub fn moments(&self) -> Moments {
        polygon_moments(&self.points)
    }

    /// Shift every point by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for p in &mut self.points {
            p[0] += dx;
            p[1] += dy;
        }
    }
}

/// One node of a [`ContourTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContourNode {
    pub contour: Contour,
    /// Immediately enclosing contour, `None` for roots.
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Every boundary of a mask, organised by enclosure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContourTree {
    nodes: Vec<ContourNode>,
}

impl ContourTree {
    /// Trace all contours of the non-zero pixels of `mask`.
    pub fn from_mask(mask: &GrayImage) -> Self {
        let raw = find_contours::<i32>(mask);
        let mut nodes: Vec<ContourNode> = raw
            .into_iter()
            .map(|c| ContourNode {
                contour: Contour {
                    points: c.points.iter().map(|p| [p.x, p.y]).collect(),
                    kind: match c.border_type {
                        BorderType::Outer => ContourKind::Outer,
                        BorderType::Hole => ContourKind::Hole,
                    },
                },
                parent: c.parent,
                children: Vec::new(),
            })
            .collect();

        for i in 0..nodes.len() {
            if let Some(p) = nodes[i].parent {
                nodes[p].children.push(i);
            }
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &ContourNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[ContourNode] {
        &self.nodes
    }

    /// Contours without a parent.
    pub fn roots(&self) -> impl Iterator<Item = (usize, &ContourNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
    }

    /// Outer contours that are not nested in anything (external boundaries only).
    pub fn external(&self) -> impl Iterator<Item = &Contour> + '_ {
        self.roots()
            .map(|(_, n)| &n.contour)
            .filter(|c| c.kind == ContourKind::Outer)
    }

    /// Cavities: hole contours that have an enclosing parent.
    pub fn holes(&self) -> impl Iterator<Item = (usize, &ContourNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_some() && n.contour.kind == ContourKind::Hole)
    }

    /// Number of ancestors of node `index`.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut cur = self.nodes[index].parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.nodes[p].parent;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square_with_hole() -> GrayImage {
        let mut mask = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 12..16 {
            for x in 12..16 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        mask
    }

    #[test]
    fn hole_is_child_of_outer_boundary() {
        let tree = ContourTree::from_mask(&square_with_hole());
        assert_eq!(tree.len(), 2);

        let (root_idx, root) = tree.roots().next().expect("one root");
        assert_eq!(root.contour.kind, ContourKind::Outer);
        assert_eq!(root.children.len(), 1);

        let holes: Vec<_> = tree.holes().collect();
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].1.parent, Some(root_idx));
        assert_eq!(tree.depth(holes[0].0), 1);
    }

    #[test]
    fn external_skips_islands_inside_holes() {
        let mut mask = square_with_hole();
        // Enlarge the hole and drop an island into it.
        for y in 9..21 {
            for x in 9..21 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 13..17 {
            for x in 13..17 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let tree = ContourTree::from_mask(&mask);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.external().count(), 1);
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let tree = ContourTree::from_mask(&GrayImage::new(10, 10));
        assert!(tree.is_empty());
    }

    #[test]
    fn outer_area_of_square() {
        let tree = ContourTree::from_mask(&square_with_hole());
        let outer = tree.external().next().expect("outer");
        // Pixel-centre polygon of a 20x20 block spans 19x19.
        assert!((outer.area() - 361.0).abs() < 1e-9);
        assert_eq!(
            outer.bounding_box(),
            Some(BoundingBox {
                x: 5,
                y: 5,
                w: 20,
                h: 20
            })
        );
    }
}
