//! Image-sequence camera backend
//!
//! Plays back the still images of a directory in file-name order, looping, as
//! if they were a live camera. Handy for replaying recorded plates.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::frame::RawFrame;
use super::{CameraBackend, CameraDevice, CameraStream, DeviceRequest};
use crate::errors::DeviceAcquisitionError;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Camera backend reading frames from a directory of images
#[derive(Debug, Clone)]
pub struct ImageSequenceCamera {
    dir: PathBuf,
}

impl ImageSequenceCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn label(&self) -> String {
        format!("Image sequence {}", self.dir.display())
    }

    fn image_paths(&self) -> Result<Vec<PathBuf>, DeviceAcquisitionError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            DeviceAcquisitionError::Unavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl CameraBackend for ImageSequenceCamera {
    fn enumerate(&mut self) -> Result<Vec<CameraDevice>, DeviceAcquisitionError> {
        if !self.dir.is_dir() {
            return Err(DeviceAcquisitionError::NoDevice);
        }
        Ok(vec![CameraDevice {
            id: self.dir.display().to_string(),
            label: self.label(),
        }])
    }

    fn open(
        &mut self,
        _request: &DeviceRequest,
    ) -> Result<Box<dyn CameraStream>, DeviceAcquisitionError> {
        let mut frames = Vec::new();
        for path in self.image_paths()? {
            match image::open(&path) {
                Ok(img) => frames.push(img.to_rgba8()),
                Err(e) => warn!("Skipping unreadable image {:?}: {}", path, e),
            }
        }

        if frames.is_empty() {
            return Err(DeviceAcquisitionError::Unavailable(format!(
                "no readable images in {}",
                self.dir.display()
            )));
        }

        info!("Loaded {} frames from {:?}", frames.len(), self.dir);
        Ok(Box::new(SequenceStream {
            label: self.label(),
            frames,
            position: 0,
        }))
    }
}

struct SequenceStream {
    label: String,
    frames: Vec<RgbaImage>,
    position: usize,
}

impl CameraStream for SequenceStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_frame(&mut self) -> Result<RawFrame, DeviceAcquisitionError> {
        let image = self.frames[self.position % self.frames.len()].clone();
        self.position = (self.position + 1) % self.frames.len();
        Ok(RawFrame::new(image))
    }
}
