//! Counting configuration.

use std::path::Path;

use crate::error::ConfigError;
use crate::extract::ExtractConfig;
use crate::mask::{BackgroundKey, CleanupConfig};
use crate::overlay::OverlayStyle;
use crate::seeds::SeedConfig;

/// Every tunable of the counting pipeline.
///
/// Each section falls back to its defaults when omitted from JSON, so a
/// config file only needs the fields it changes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CountConfig {
    /// HSV range of the backdrop.
    pub background: BackgroundKey,
    /// Opening/closing element and hole-filling threshold.
    pub cleanup: CleanupConfig,
    /// Erosion and seed-confidence fraction.
    pub seeds: SeedConfig,
    /// Minimum counted area.
    pub extract: ExtractConfig,
    /// Annotation appearance.
    pub overlay: OverlayStyle,
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

impl CountConfig {
    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.background
            .check()
            .map_err(ConfigError::InvalidBackgroundKey)?;
        self.cleanup
            .kernel
            .check()
            .map_err(|reason| ConfigError::InvalidKernel {
                stage: "cleanup",
                reason,
            })?;
        self.seeds
            .erode_kernel
            .check()
            .map_err(|reason| ConfigError::InvalidKernel {
                stage: "seeds",
                reason,
            })?;
        check_threshold("cleanup.max_hole_area", self.cleanup.max_hole_area)?;
        check_threshold("extract.min_area", self.extract.min_area)?;

        let f = self.seeds.confidence_fraction;
        if !(f.is_finite() && (0.0..1.0).contains(&f)) {
            return Err(ConfigError::InvalidFraction(f));
        }
        Ok(())
    }
}
