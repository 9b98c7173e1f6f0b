//! Frame sources: a single still image, an ordered directory of frames, or a
//! live camera (see [`crate::camera`]).

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no image files in {0}")]
    Empty(PathBuf),

    #[error("camera {device}: {reason}")]
    Capture { device: i32, reason: String },
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// File stem, used to name per-frame outputs.
    pub name: String,
    pub image: RgbImage,
}

/// Anything that yields frames in order.
pub trait FrameSource: Iterator<Item = Result<Frame, SourceError>> {
    fn describe(&self) -> String;
}

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_frame(path: &Path) -> Result<Frame, SourceError> {
    let img = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(io) => SourceError::Io {
            path: path.to_path_buf(),
            source: io,
        },
        other => SourceError::Decode {
            path: path.to_path_buf(),
            source: other,
        },
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    Ok(Frame {
        name,
        image: img.to_rgb8(),
    })
}

/// Yields one image once.
pub struct StillImage {
    path: PathBuf,
    done: bool,
}

impl StillImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            done: false,
        }
    }
}

impl Iterator for StillImage {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(load_frame(&self.path))
    }
}

impl FrameSource for StillImage {
    fn describe(&self) -> String {
        format!("image {}", self.path.display())
    }
}

/// Image files of a directory in lexicographic file-name order.
pub struct DirectorySequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    pos: usize,
    looping: bool,
}

impl DirectorySequence {
    pub fn open(dir: impl Into<PathBuf>, looping: bool) -> Result<Self, SourceError> {
        let dir = dir.into();
        let entries = std::fs::read_dir(&dir).map_err(|source| SourceError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_image_path(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(SourceError::Empty(dir));
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        tracing::debug!("{} frames in {}", files.len(), dir.display());
        Ok(Self {
            dir,
            files,
            pos: 0,
            looping,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Iterator for DirectorySequence {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.files.len() {
            if !self.looping {
                return None;
            }
            self.pos = 0;
        }
        let path = &self.files[self.pos];
        self.pos += 1;
        Some(load_frame(path))
    }
}

impl FrameSource for DirectorySequence {
    fn describe(&self) -> String {
        format!(
            "{} frames from {}{}",
            self.files.len(),
            self.dir.display(),
            if self.looping { " (looping)" } else { "" }
        )
    }
}

/// Pick a source for `path`: directories become sequences, files still images.
pub fn open_source(path: &Path, looping: bool) -> Result<Box<dyn FrameSource>, SourceError> {
    if path.is_dir() {
        Ok(Box::new(DirectorySequence::open(path, looping)?))
    } else {
        Ok(Box::new(StillImage::new(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(4, 3, Rgb([shade, 0, 0]))
            .save(dir.join(name))
            .expect("save png");
    }

    #[test]
    fn directory_order_is_lexicographic_and_filtered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frame(dir.path(), "b.png", 2);
        write_frame(dir.path(), "a.png", 1);
        write_frame(dir.path(), "c.PNG", 3);
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");

        let seq = DirectorySequence::open(dir.path(), false).expect("open");
        let names: Vec<String> = seq.map(|f| f.expect("frame").name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn looping_restarts_from_first_frame() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frame(dir.path(), "f0.png", 10);
        write_frame(dir.path(), "f1.png", 20);

        let seq = DirectorySequence::open(dir.path(), true).expect("open");
        let shades: Vec<u8> = seq
            .take(5)
            .map(|f| f.expect("frame").image.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 10, 20, 10]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            DirectorySequence::open(dir.path(), false),
            Err(SourceError::Empty(_))
        ));
    }

    #[test]
    fn still_image_yields_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frame(dir.path(), "only.png", 5);
        let mut src = StillImage::new(dir.path().join("only.png"));
        let frame = src.next().expect("one item").expect("decoded");
        assert_eq!(frame.name, "only");
        assert_eq!(frame.image.dimensions(), (4, 3));
        assert!(src.next().is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let mut src = StillImage::new("/nonexistent/frame.png");
        let err = src.next().expect("one item").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/frame.png"));
    }

    #[test]
    fn open_source_dispatches_on_path_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frame(dir.path(), "x.png", 1);
        let seq = open_source(dir.path(), false).expect("dir source");
        assert!(seq.describe().contains("1 frames"));
        let still = open_source(&dir.path().join("x.png"), false).expect("file source");
        assert!(still.describe().starts_with("image "));
    }
}
