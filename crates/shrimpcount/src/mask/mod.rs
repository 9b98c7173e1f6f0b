//! Binary silhouette construction: background keying, morphology, hole filling.

mod clean;
mod foreground;
pub mod morphology;

pub use clean::{clean_mask, CleanedMask, CleanupConfig};
pub use foreground::{build_foreground_mask, BackgroundKey};
pub use morphology::{KernelShape, KernelSpec, StructuringElement};

/// Number of non-zero pixels.
pub fn count_nonzero(mask: &image::GrayImage) -> usize {
    mask.iter().filter(|&&p| p != 0).count()
}
