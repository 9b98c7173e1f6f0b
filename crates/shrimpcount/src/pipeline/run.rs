//! Stage orchestration: mask → cleanup → seeds → grow → extract → overlays.

use image::RgbImage;

use super::result::{CountResult, PipelineStats, StageImages};
use crate::config::CountConfig;
use crate::error::ConfigError;
use crate::extract::extract_regions;
use crate::mask::{build_foreground_mask, clean_mask, count_nonzero};
use crate::overlay::{overlay_instructions, render_overlays};
use crate::seeds::generate_seeds;
use crate::watershed::{label_markers, watershed, Label};

/// Run every stage with an already validated config.
pub(crate) fn run(frame: &RgbImage, config: &CountConfig) -> (CountResult, StageImages) {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        tracing::debug!("empty frame {}x{}", w, h);
        return (CountResult::empty(frame), StageImages::blank(w, h));
    }

    let foreground = build_foreground_mask(frame, &config.background);
    let foreground_px = count_nonzero(&foreground);
    tracing::debug!("foreground: {} px", foreground_px);

    let cleaned = clean_mask(&foreground, &config.cleanup);
    let seeds = generate_seeds(&cleaned.final_mask, &config.seeds);
    tracing::debug!(
        "seeds: max distance {:?}, threshold {:?}",
        seeds.max_distance,
        seeds.threshold
    );

    let markers = label_markers(&seeds.sure_foreground, &seeds.unknown);
    let seed_count = markers.seed_count;
    let label_map =
        watershed(frame, markers).expect("markers are built from this frame's masks");
    let boundary_px = label_map.count(Label::Boundary);
    tracing::debug!(
        "grown {} regions from {} seeds, {} boundary px",
        label_map.region_count(),
        seed_count,
        boundary_px
    );

    let extraction = extract_regions(&label_map, &cleaned.final_mask, &config.extract);
    let object_count = extraction.regions.len();
    let overlays = overlay_instructions(&extraction.regions, object_count, &config.overlay);
    let annotated = render_overlays(frame, &overlays);

    let stats = PipelineStats {
        foreground_px,
        holes_found: cleaned.holes_found,
        holes_filled: cleaned.holes_filled,
        seed_count,
        boundary_px,
        rejected_fragments: extraction.rejected,
    };
    tracing::info!(
        "counted {} objects ({} seeds, {} fragments rejected)",
        object_count,
        seed_count,
        extraction.rejected
    );

    let result = CountResult {
        regions: extraction.regions,
        label_map,
        annotated,
        overlays,
        object_count,
        stats,
    };
    let stages = StageImages {
        foreground,
        cleaned: cleaned.cleaned,
        final_mask: cleaned.final_mask,
        eroded: seeds.eroded,
        sure_foreground: seeds.sure_foreground,
        unknown: seeds.unknown,
    };
    (result, stages)
}

/// Segment a frame and count the objects on it.
///
/// The config is validated first; invalid settings are the only error.
/// Empty frames and frames without foreground give a zero count.
pub fn segment_and_count(frame: &RgbImage, config: &CountConfig) -> Result<CountResult, ConfigError> {
    config.validate()?;
    Ok(run(frame, config).0)
}

/// [`segment_and_count`] that also returns every intermediate mask.
pub fn segment_and_count_with_stages(
    frame: &RgbImage,
    config: &CountConfig,
) -> Result<(CountResult, StageImages), ConfigError> {
    config.validate()?;
    Ok(run(frame, config))
}
