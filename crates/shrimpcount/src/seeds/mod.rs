//! Seed generation: confident object interiors plus the undecided band.
//!
//! The silhouette is eroded slightly so that touching objects come apart,
//! then a Euclidean distance transform ranks interior depth. Pixels deeper
//! than a fixed fraction of the frame's deepest pixel become seeds; the
//! threshold therefore adapts to object scale.

mod distance;

use image::GrayImage;

use crate::mask::morphology::{erode, KernelSpec};

pub use distance::{euclidean_distance_transform, max_finite, DistanceField};

/// Seed generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Erosion applied before the distance transform.
    pub erode_kernel: KernelSpec,
    pub erode_iterations: usize,
    /// Seeds are pixels with `distance > confidence_fraction * max_distance`.
    pub confidence_fraction: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            erode_kernel: KernelSpec::rect(3),
            erode_iterations: 1,
            confidence_fraction: 0.3,
        }
    }
}

/// Output of [`generate_seeds`].
#[derive(Debug, Clone)]
pub struct Seeds {
    pub eroded: GrayImage,
    /// Confident interior pixels (255).
    pub sure_foreground: GrayImage,
    /// Foreground pixels not claimed by any seed (255).
    pub unknown: GrayImage,
    /// Largest finite interior distance, if any.
    pub max_distance: Option<f32>,
    /// Distance threshold actually applied.
    pub threshold: Option<f32>,
}

pub fn generate_seeds(final_mask: &GrayImage, config: &SeedConfig) -> Seeds {
    let se = config.erode_kernel.build();
    let eroded = erode(final_mask, &se, config.erode_iterations);
    let dist = euclidean_distance_transform(&eroded);
    let max_distance = max_finite(&dist);

    let (w, h) = final_mask.dimensions();
    let mut sure_foreground = GrayImage::new(w, h);
    let threshold = match max_distance {
        Some(m) if m > 0.0 => Some((config.confidence_fraction * m as f64) as f32),
        _ => None,
    };
    if let Some(t) = threshold {
        for (dst, &d) in sure_foreground.iter_mut().zip(dist.iter()) {
            if d.is_finite() && d > t {
                *dst = 255;
            }
        }
    } else {
        tracing::debug!("no finite interior distance; no seeds");
    }

    let mut unknown = GrayImage::new(w, h);
    for ((dst, &m), &s) in unknown
        .iter_mut()
        .zip(final_mask.iter())
        .zip(sure_foreground.iter())
    {
        if m != 0 && s == 0 {
            *dst = 255;
        }
    }

    Seeds {
        eroded,
        sure_foreground,
        unknown,
        max_distance,
        threshold,
    }
}
