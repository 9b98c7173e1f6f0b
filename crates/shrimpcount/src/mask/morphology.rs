//! Binary morphology on {0, 255} masks.
//!
//! Structuring elements are rasterised here and handed to
//! `imageproc::morphology` as a [`Mask`] anchored at `(width / 2, height / 2)`.
//! Pixels outside the frame are ignored: they never erode a foreground pixel
//! and never dilate into one.

use image::{GrayImage, Luma};
use imageproc::morphology::{
    grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open, Mask,
};

/// Largest accepted kernel side, in pixels.
pub const MAX_KERNEL_SIDE: u32 = 255;

/// Shape of a structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelShape {
    /// Full rectangle.
    Rect,
    /// Ellipse inscribed in the `width × height` box.
    #[default]
    Ellipse,
    /// Centre row plus centre column.
    Cross,
}

/// Serializable description of a structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KernelSpec {
    pub shape: KernelShape,
    pub width: u32,
    pub height: u32,
}

impl KernelSpec {
    pub const fn new(shape: KernelShape, width: u32, height: u32) -> Self {
        Self {
            shape,
            width,
            height,
        }
    }

    /// Square ellipse, the default cleanup kernel.
    pub const fn ellipse(size: u32) -> Self {
        Self::new(KernelShape::Ellipse, size, size)
    }

    /// Square rectangle, the default seed-erosion kernel.
    pub const fn rect(size: u32) -> Self {
        Self::new(KernelShape::Rect, size, size)
    }

    /// Returns a reason when the kernel cannot be built.
    pub fn check(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("{}x{} kernel is empty", self.width, self.height));
        }
        if self.width > MAX_KERNEL_SIDE || self.height > MAX_KERNEL_SIDE {
            return Err(format!(
                "{}x{} kernel exceeds {} px per side",
                self.width, self.height, MAX_KERNEL_SIDE
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> StructuringElement {
        StructuringElement::new(*self)
    }
}

impl Default for KernelSpec {
    fn default() -> Self {
        Self::ellipse(5)
    }
}

/// Rasterised structuring element, ready for `imageproc` morphology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    spec: KernelSpec,
    raster: GrayImage,
    mask: Mask,
}

impl StructuringElement {
    pub fn new(spec: KernelSpec) -> Self {
        let w = spec.width.clamp(1, MAX_KERNEL_SIDE);
        let h = spec.height.clamp(1, MAX_KERNEL_SIDE);
        let (wi, hi) = (w as i32, h as i32);
        let ax = wi / 2;
        let ay = hi / 2;

        let mut raster = GrayImage::new(w, h);
        for row in 0..hi {
            let (j1, j2) = match spec.shape {
                KernelShape::Rect => (0, wi),
                KernelShape::Cross if row == ay => (0, wi),
                KernelShape::Cross => (ax, ax + 1),
                KernelShape::Ellipse => ellipse_row_span(row, wi, hi),
            };
            for col in j1..j2 {
                raster.put_pixel(col as u32, row as u32, Luma([255]));
            }
        }
        // Sides are capped at 255, so the anchor always fits in a u8.
        let mask = Mask::from_image(&raster, ax as u8, ay as u8);

        Self { spec, raster, mask }
    }

    pub fn spec(&self) -> KernelSpec {
        self.spec
    }

    /// The imageproc mask, anchored at the kernel centre.
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Number of active kernel pixels.
    pub fn active_count(&self) -> usize {
        self.raster.pixels().filter(|p| p[0] != 0).count()
    }

    /// Render as rows of 0/1, mainly for inspection.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.raster
            .rows()
            .map(|row| row.map(|p| u8::from(p[0] != 0)).collect())
            .collect()
    }
}

/// Half-open column span `[j1, j2)` of ellipse row `row`.
fn ellipse_row_span(row: i32, w: i32, h: i32) -> (i32, i32) {
    let a = w / 2;
    let b = h / 2;
    let dy = row - b;
    if b == 0 {
        return (0, w);
    }
    if dy.abs() > b {
        return (0, 0);
    }
    let t = 1.0 - (dy * dy) as f64 / (b * b) as f64;
    let dx = (a as f64 * t.max(0.0).sqrt()).round() as i32;
    ((a - dx).max(0), (a + dx + 1).min(w))
}

fn is_empty(mask: &GrayImage) -> bool {
    mask.width() == 0 || mask.height() == 0
}

/// Erode `iterations` times. Zero iterations returns a copy.
pub fn erode(mask: &GrayImage, se: &StructuringElement, iterations: usize) -> GrayImage {
    let mut cur = mask.clone();
    if is_empty(mask) {
        return cur;
    }
    for _ in 0..iterations {
        cur = grayscale_erode(&cur, se.mask());
    }
    cur
}

/// Dilate `iterations` times. Zero iterations returns a copy.
pub fn dilate(mask: &GrayImage, se: &StructuringElement, iterations: usize) -> GrayImage {
    let mut cur = mask.clone();
    if is_empty(mask) {
        return cur;
    }
    for _ in 0..iterations {
        cur = grayscale_dilate(&cur, se.mask());
    }
    cur
}

/// Erosion followed by dilation: removes foreground specks smaller than the element.
pub fn open(mask: &GrayImage, se: &StructuringElement) -> GrayImage {
    if is_empty(mask) {
        return mask.clone();
    }
    grayscale_open(mask, se.mask())
}

/// Dilation followed by erosion: removes background specks smaller than the element.
pub fn close(mask: &GrayImage, se: &StructuringElement) -> GrayImage {
    if is_empty(mask) {
        return mask.clone();
    }
    grayscale_close(mask, se.mask())
}
