//! File-backed presentation sink.

use std::path::{Path, PathBuf};

use shrimpcount::{colorize_label_map, CountResult, StageImages};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Writes per-frame artefacts under one directory.
///
/// For a frame named `N`: `N_annotated.png`, `N_labels.png`,
/// `N_overlays.json`, `N_summary.json`, and with stages enabled one
/// `N_<stage>.png` per intermediate mask.
#[derive(Debug, Clone)]
pub struct OutputSink {
    dir: PathBuf,
    write_stages: bool,
}

impl OutputSink {
    pub fn create(dir: impl Into<PathBuf>, write_stages: bool) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| SinkError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, write_stages })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn wants_stages(&self) -> bool {
        self.write_stages
    }

    fn write_text(&self, path: PathBuf, text: &str) -> Result<PathBuf, SinkError> {
        std::fs::write(&path, text).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn write_png<P, C>(
        &self,
        path: PathBuf,
        img: &image::ImageBuffer<P, C>,
    ) -> Result<PathBuf, SinkError>
    where
        P: image::PixelWithColorType,
        [P::Subpixel]: image::EncodableLayout,
        C: std::ops::Deref<Target = [P::Subpixel]>,
    {
        img.save(&path).map_err(|source| SinkError::Encode {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Write everything for one frame; returns the files written.
    pub fn write(
        &self,
        name: &str,
        result: &CountResult,
        stages: Option<&StageImages>,
    ) -> Result<Vec<PathBuf>, SinkError> {
        let mut written = Vec::new();
        written.push(self.write_png(self.dir.join(format!("{name}_annotated.png")), &result.annotated)?);
        written.push(self.write_png(
            self.dir.join(format!("{name}_labels.png")),
            &colorize_label_map(&result.label_map),
        )?);
        written.push(self.write_text(
            self.dir.join(format!("{name}_overlays.json")),
            &serde_json::to_string_pretty(&result.overlays)?,
        )?);
        written.push(self.write_text(
            self.dir.join(format!("{name}_summary.json")),
            &serde_json::to_string_pretty(&result.summary())?,
        )?);

        if self.write_stages {
            if let Some(stages) = stages {
                for (stage, mask) in stages.named() {
                    written.push(self.write_png(self.dir.join(format!("{name}_{stage}.png")), mask)?);
                }
            }
        }
        tracing::debug!("wrote {} files for {}", written.len(), name);
        Ok(written)
    }
}
