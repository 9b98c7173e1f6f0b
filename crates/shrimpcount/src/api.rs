//! High-level counting API.
//!
//! [`Counter`] holds a validated [`CountConfig`] and counts any number of
//! frames with it.

use std::path::Path;

use image::RgbImage;

use crate::config::CountConfig;
use crate::error::ConfigError;
use crate::pipeline::{self, CountResult, StageImages};

/// Primary counting interface.
///
/// Create once, count many frames. The config is checked at construction,
/// so counting itself cannot fail.
///
/// # Examples
///
/// ```no_run
/// use shrimpcount::Counter;
/// use image::RgbImage;
///
/// let counter = Counter::new();
/// let frame = RgbImage::new(640, 480);
/// let result = counter.count(&frame);
/// println!("Counted {} objects", result.object_count);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Counter {
    config: CountConfig,
}

impl Counter {
    /// Counter with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: CountConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load a JSON config file and create a counter in one step.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::with_config(CountConfig::from_json_file(path)?)
    }

    /// Access the current configuration.
    pub fn config(&self) -> &CountConfig {
        &self.config
    }

    pub fn count(&self, frame: &RgbImage) -> CountResult {
        pipeline::run(frame, &self.config).0
    }

    /// Count and keep every intermediate mask.
    pub fn count_with_stages(&self, frame: &RgbImage) -> (CountResult, StageImages) {
        pipeline::run(frame, &self.config)
    }
}
