//! Synthetic camera backend
//!
//! Renders a gray scene in which a plate-like rectangle periodically appears
//! and disappears. Used for demos without a camera and throughout the tests.

use image::{Rgba, RgbaImage};
use tracing::info;

use super::frame::RawFrame;
use super::{CameraBackend, CameraDevice, CameraStream, DeviceRequest, DeviceSelection};
use crate::errors::DeviceAcquisitionError;

const BACKGROUND: Rgba<u8> = Rgba([120, 120, 120, 255]);
const PLATE: Rgba<u8> = Rgba([245, 245, 245, 255]);
const INK: Rgba<u8> = Rgba([10, 10, 10, 255]);

/// Camera backend producing generated frames
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    devices: Vec<CameraDevice>,
    permission_denied: bool,
    present_frames: u64,
    absent_frames: u64,
}

impl SyntheticCamera {
    /// Create a synthetic camera producing `width` x `height` frames
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            devices: vec![
                CameraDevice {
                    id: "synthetic-0".to_string(),
                    label: "Synthetic Front Camera".to_string(),
                },
                CameraDevice {
                    id: "synthetic-1".to_string(),
                    label: "Synthetic Back Camera".to_string(),
                },
            ],
            permission_denied: false,
            present_frames: 150,
            absent_frames: 30,
        }
    }

    /// Replace the advertised devices
    pub fn with_devices(mut self, devices: Vec<CameraDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Plate visible for `present` frames, then hidden for `absent` frames
    pub fn with_schedule(mut self, present: u64, absent: u64) -> Self {
        self.present_frames = present;
        self.absent_frames = absent;
        self
    }

    /// Refuse access as if the user denied the camera permission
    pub fn deny_permission(mut self) -> Self {
        self.permission_denied = true;
        self
    }
}

impl CameraBackend for SyntheticCamera {
    fn enumerate(&mut self) -> Result<Vec<CameraDevice>, DeviceAcquisitionError> {
        if self.permission_denied {
            return Err(DeviceAcquisitionError::PermissionDenied);
        }
        Ok(self.devices.clone())
    }

    fn open(
        &mut self,
        request: &DeviceRequest,
    ) -> Result<Box<dyn CameraStream>, DeviceAcquisitionError> {
        if self.permission_denied {
            return Err(DeviceAcquisitionError::PermissionDenied);
        }

        let device = match &request.selection {
            DeviceSelection::Exact(id) => self
                .devices
                .iter()
                .find(|d| &d.id == id)
                .ok_or_else(|| DeviceAcquisitionError::Unavailable(format!("unknown device {}", id)))?,
            DeviceSelection::Generic(_) => self.devices.first().ok_or(DeviceAcquisitionError::NoDevice)?,
        };

        info!(
            "Synthetic camera '{}' streaming {}x{}",
            device.label, self.width, self.height
        );

        Ok(Box::new(SyntheticStream {
            label: device.label.clone(),
            width: self.width,
            height: self.height,
            frame_count: 0,
            present_frames: self.present_frames,
            absent_frames: self.absent_frames,
        }))
    }
}

struct SyntheticStream {
    label: String,
    width: u32,
    height: u32,
    frame_count: u64,
    present_frames: u64,
    absent_frames: u64,
}

impl SyntheticStream {
    fn plate_visible(&self) -> bool {
        let period = self.present_frames + self.absent_frames;
        period == 0 || self.frame_count % period < self.present_frames
    }
}

impl CameraStream for SyntheticStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_frame(&mut self) -> Result<RawFrame, DeviceAcquisitionError> {
        let mut image = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        if self.plate_visible() {
            draw_plate(&mut image);
        }
        self.frame_count += 1;
        Ok(RawFrame::new(image))
    }
}

/// Paint a bordered plate with a row of glyph blocks at the image center
pub(crate) fn draw_plate(image: &mut RgbaImage) {
    let (width, height) = image.dimensions();
    let plate_w = width * 2 / 5;
    let plate_h = plate_w * 10 / 32;
    if plate_w < 16 || plate_h < 8 || plate_h >= height {
        return;
    }
    let left = (width - plate_w) / 2;
    let top = (height - plate_h) / 2;
    let border = (plate_h / 16).max(2);

    fill(image, left, top, plate_w, plate_h, INK);
    fill(
        image,
        left + border,
        top + border,
        plate_w - 2 * border,
        plate_h - 2 * border,
        PLATE,
    );

    // Six glyph blocks, small enough to never pass the candidate filter themselves
    let glyph_w = plate_w / 10;
    let glyph_h = plate_h / 2;
    let gap = (plate_w - 6 * glyph_w) / 7;
    for i in 0..6 {
        let gx = left + gap + i * (glyph_w + gap);
        fill(image, gx, top + plate_h / 4, glyph_w, glyph_h, INK);
    }
}

fn fill(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    for py in y..(y + h).min(image.height()) {
        for px in x..(x + w).min(image.width()) {
            image.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Facing;

    fn request(selection: DeviceSelection) -> DeviceRequest {
        DeviceRequest {
            selection,
            ideal_resolution: (640, 480),
            max_fps: 30,
        }
    }

    #[test]
    fn test_schedule_toggles_plate() {
        let mut camera = SyntheticCamera::new(200, 100).with_schedule(2, 1);
        let mut stream = camera
            .open(&request(DeviceSelection::Generic(Facing::EnvironmentPreferred)))
            .unwrap();

        let center = |frame: &RawFrame| *frame.image.get_pixel(100, 50);
        let first = stream.next_frame().unwrap();
        let second = stream.next_frame().unwrap();
        let third = stream.next_frame().unwrap();

        assert_ne!(center(&first), BACKGROUND);
        assert_ne!(center(&second), BACKGROUND);
        assert_eq!(center(&third), BACKGROUND);
    }

    #[test]
    fn test_open_exact_unknown_device() {
        let mut camera = SyntheticCamera::new(64, 48);
        let result = camera.open(&request(DeviceSelection::Exact("nope".to_string())));
        assert!(matches!(result, Err(DeviceAcquisitionError::Unavailable(_))));
    }

    #[test]
    fn test_open_generic_without_devices() {
        let mut camera = SyntheticCamera::new(64, 48).with_devices(vec![]);
        let result = camera.open(&request(DeviceSelection::Generic(Facing::EnvironmentPreferred)));
        assert!(matches!(result, Err(DeviceAcquisitionError::NoDevice)));
    }

    #[test]
    fn test_denied_permission() {
        let mut camera = SyntheticCamera::new(64, 48).deny_permission();
        assert_eq!(camera.enumerate(), Err(DeviceAcquisitionError::PermissionDenied));
    }
}
