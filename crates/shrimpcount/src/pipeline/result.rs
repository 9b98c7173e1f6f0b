use image::{GrayImage, RgbImage};

use crate::extract::Region;
use crate::overlay::Overlay;
use crate::watershed::LabelMap;

/// Per-frame stage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PipelineStats {
    /// Non-zero pixels of the raw foreground mask.
    pub foreground_px: usize,
    pub holes_found: usize,
    pub holes_filled: usize,
    /// Connected seed components handed to the grower.
    pub seed_count: usize,
    pub boundary_px: usize,
    /// External outlines dropped by the minimum-area rule.
    pub rejected_fragments: usize,
}

/// Full counting result for a single frame.
#[derive(Debug, Clone)]
pub struct CountResult {
    /// Counted regions, indexed from 1 in extraction order.
    pub regions: Vec<Region>,
    pub label_map: LabelMap,
    /// Input frame with every non-text overlay drawn on it.
    pub annotated: RgbImage,
    pub overlays: Vec<Overlay>,
    pub object_count: usize,
    pub stats: PipelineStats,
}

impl CountResult {
    /// Zero-count result for a frame with the provided dimensions.
    pub fn empty(frame: &RgbImage) -> Self {
        let (w, h) = frame.dimensions();
        Self {
            regions: Vec::new(),
            label_map: LabelMap::new(w, h),
            annotated: frame.clone(),
            overlays: Vec::new(),
            object_count: 0,
            stats: PipelineStats::default(),
        }
    }

    pub fn image_size(&self) -> [u32; 2] {
        [self.label_map.width(), self.label_map.height()]
    }

    /// Serializable view without the image buffers.
    pub fn summary(&self) -> CountSummary {
        CountSummary {
            image_size: self.image_size(),
            object_count: self.object_count,
            regions: self.regions.clone(),
            stats: self.stats,
        }
    }
}

/// JSON-friendly per-frame report.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CountSummary {
    /// Image dimensions [width, height].
    pub image_size: [u32; 2],
    pub object_count: usize,
    pub regions: Vec<Region>,
    pub stats: PipelineStats,
}

/// Intermediate masks, for inspection.
#[derive(Debug, Clone)]
pub struct StageImages {
    pub foreground: GrayImage,
    /// After opening and closing.
    pub cleaned: GrayImage,
    /// After small-hole filling.
    pub final_mask: GrayImage,
    pub eroded: GrayImage,
    pub sure_foreground: GrayImage,
    pub unknown: GrayImage,
}

impl StageImages {
    pub(crate) fn blank(width: u32, height: u32) -> Self {
        let blank = GrayImage::new(width, height);
        Self {
            foreground: blank.clone(),
            cleaned: blank.clone(),
            final_mask: blank.clone(),
            eroded: blank.clone(),
            sure_foreground: blank.clone(),
            unknown: blank,
        }
    }

    /// `(name, mask)` pairs in stage order.
    pub fn named(&self) -> [(&'static str, &GrayImage); 6] {
        [
            ("foreground", &self.foreground),
            ("cleaned", &self.cleaned),
            ("final_mask", &self.final_mask),
            ("eroded", &self.eroded),
            ("sure_foreground", &self.sure_foreground),
            ("unknown", &self.unknown),
        ]
    }
}
