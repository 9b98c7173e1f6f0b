//! shrimpcount: pure-Rust object counter for frames shot against a keyed backdrop.
//!
//! Objects are separated from a uniformly coloured background, touching
//! objects are split by marker-controlled region growing, and every large
//! enough region is counted. The pipeline stages are:
//!
//! 1. **Foreground** – HSV conversion and background-key thresholding.
//! 2. **Cleanup** – morphological opening and closing, then small-hole filling
//!    driven by the contour hierarchy.
//! 3. **Seeds** – slight erosion, exact Euclidean distance transform and a
//!    relative depth threshold for confident interiors.
//! 4. **Growing** – priority-flood watershed from the labelled seeds over the
//!    colour frame; contested pixels become boundaries.
//! 5. **Extraction** – per-region external outlines, minimum-area filter,
//!    bounding boxes and centroids.
//! 6. **Overlays** – drawing instructions for the counted regions.
//!
//! # Public API
//! - [`Counter`] and [`segment_and_count`] as entry points
//! - [`CountConfig`] for tuning
//! - stage functions and their result types for inspection and benchmarks

mod api;
mod color;
mod config;
mod contour;
mod error;
mod extract;
mod mask;
mod overlay;
mod pipeline;
mod seeds;
mod watershed;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Counter;
pub use color::rgb_to_hsv;
pub use config::CountConfig;
pub use contour::{BoundingBox, Contour, ContourKind, ContourNode, ContourTree};
pub use error::ConfigError;
pub use extract::{extract_regions, ExtractConfig, Extraction, Region};
pub use mask::{
    build_foreground_mask, clean_mask, BackgroundKey, CleanedMask, CleanupConfig, KernelShape,
    KernelSpec,
};
pub use overlay::{
    colorize_label_map, overlay_instructions, region_color, render_overlays, Overlay,
    OverlayStyle,
};
pub use pipeline::{
    segment_and_count, segment_and_count_with_stages, CountResult, CountSummary, PipelineStats,
    StageImages,
};
pub use seeds::{euclidean_distance_transform, generate_seeds, DistanceField, SeedConfig, Seeds};
pub use watershed::{grow_regions, Label, LabelMap};
