//! Live capture from a video device.
//!
//! Capture goes through OpenCV's `videoio` and is only compiled with the
//! `camera` feature. The BGR to RGB conversion is plain byte shuffling and is
//! always available.

use image::RgbImage;

use crate::source::{Frame, FrameSource, SourceError};

/// Build a frame from packed 8-bit BGR rows.
#[cfg_attr(not(feature = "camera"), allow(dead_code))]
pub fn frame_from_bgr(
    device: i32,
    name: String,
    width: u32,
    height: u32,
    bgr: &[u8],
) -> Result<Frame, SourceError> {
    let expected = width as usize * height as usize * 3;
    if bgr.len() != expected {
        return Err(SourceError::Capture {
            device,
            reason: format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                bgr.len()
            ),
        });
    }
    let rgb: Vec<u8> = bgr
        .chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    let image = RgbImage::from_raw(width, height, rgb).ok_or_else(|| SourceError::Capture {
        device,
        reason: "frame buffer does not match its size".to_string(),
    })?;
    Ok(Frame { name, image })
}

#[cfg(feature = "camera")]
mod capture {
    use opencv::{
        core::Mat,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY},
    };

    use super::frame_from_bgr;
    use crate::source::{Frame, FrameSource, SourceError};

    /// Frames from a camera until the stream ends or a read fails.
    pub struct Camera {
        index: i32,
        capture: VideoCapture,
        frame: u64,
        done: bool,
    }

    impl Camera {
        pub fn open(index: i32) -> Result<Self, SourceError> {
            let fail = |reason: String| SourceError::Capture {
                device: index,
                reason,
            };
            let capture = VideoCapture::new(index, CAP_ANY)
                .map_err(|e| fail(format!("cannot open: {e}")))?;
            let opened = capture
                .is_opened()
                .map_err(|e| fail(format!("cannot query: {e}")))?;
            if !opened {
                return Err(fail("device did not open".to_string()));
            }
            tracing::info!("Camera {} opened", index);
            Ok(Self {
                index,
                capture,
                frame: 0,
                done: false,
            })
        }

        fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
            let index = self.index;
            let fail = |reason: String| SourceError::Capture {
                device: index,
                reason,
            };
            let mut mat = Mat::default();
            let ok = self
                .capture
                .read(&mut mat)
                .map_err(|e| fail(format!("read failed: {e}")))?;
            if !ok || mat.empty() {
                return Ok(None);
            }
            if mat.channels() != 3 {
                return Err(fail(format!("expected 3 channels, got {}", mat.channels())));
            }
            let mat = if mat.is_continuous() {
                mat
            } else {
                mat.try_clone()
                    .map_err(|e| fail(format!("cannot copy frame: {e}")))?
            };
            let bytes = mat
                .data_bytes()
                .map_err(|e| fail(format!("cannot access frame: {e}")))?;
            let name = format!("cam{}_{:06}", index, self.frame);
            let frame = frame_from_bgr(
                index,
                name,
                mat.cols() as u32,
                mat.rows() as u32,
                bytes,
            )?;
            Ok(Some(frame))
        }
    }

    impl Iterator for Camera {
        type Item = Result<Frame, SourceError>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.done {
                return None;
            }
            let item = match self.grab() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => {
                    tracing::info!("Camera {} stream ended", self.index);
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    Err(e)
                }
            };
            self.frame += 1;
            Some(item)
        }
    }

    impl FrameSource for Camera {
        fn describe(&self) -> String {
            format!("camera {}", self.index)
        }
    }
}

#[cfg(feature = "camera")]
pub use capture::Camera;

/// Open camera `index` as a frame source.
pub fn open_camera(index: i32) -> Result<Box<dyn FrameSource>, SourceError> {
    #[cfg(feature = "camera")]
    {
        Ok(Box::new(Camera::open(index)?))
    }
    #[cfg(not(feature = "camera"))]
    {
        Err(SourceError::Capture {
            device: index,
            reason: "built without the `camera` feature".to_string(),
        })
    }
}
