//! Capture payload encoding
//!
//! Crops the selected region into its own buffer and compresses it as JPEG for
//! transport to the recognition service.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage};

use super::geometry::Rect;
use crate::capture::frame::Frame;
use crate::config::EncoderSettings;
use crate::errors::EncodeError;

/// A compressed crop ready to send
#[derive(Debug, Clone)]
pub struct CapturePayload {
    /// JPEG bytes
    pub jpeg: Vec<u8>,
    /// Frame-space region the crop was taken from
    pub region: Rect,
}

impl CapturePayload {
    pub fn width(&self) -> u32 {
        self.region.width()
    }

    pub fn height(&self) -> u32 {
        self.region.height()
    }

    /// `data:` URL carrying the base64 JPEG
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.jpeg))
    }
}

/// Shrink a rectangle vertically by `margin` on top and bottom.
///
/// The height never drops below 1; when the margin eats the whole rectangle
/// the remaining row stays inside the original bounds.
pub fn trim_vertically(rect: Rect, margin: u32) -> Rect {
    let height = rect.height();
    let trimmed = height.saturating_sub(margin.saturating_mul(2)).max(1);
    let offset = margin.min(height - trimmed);

    Rect::new(rect.x(), rect.y() + offset, rect.width(), trimmed).unwrap_or(rect)
}

/// Crops and serializes selected regions
#[derive(Debug, Clone)]
pub struct CaptureEncoder {
    vertical_trim_margin: u32,
    jpeg_quality: u8,
}

impl CaptureEncoder {
    pub fn new(vertical_trim_margin: u32, jpeg_quality: u8) -> Self {
        Self {
            vertical_trim_margin,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_settings(settings: &EncoderSettings) -> Self {
        Self::new(settings.vertical_trim_margin, settings.jpeg_quality)
    }

    /// Crop `rect` (frame coordinates) out of `frame` and JPEG-encode it
    pub fn encode(&self, frame: &Frame, rect: Rect) -> Result<CapturePayload, EncodeError> {
        let region = trim_vertically(rect, self.vertical_trim_margin)
            .clamp_to(frame.width(), frame.height())
            .ok_or(EncodeError::EmptyRegion)?;

        let crop = imageops::crop_imm(
            frame.image(),
            region.x(),
            region.y(),
            region.width(),
            region.height(),
        )
        .to_image();

        // JPEG carries no alpha channel
        let rgb = DynamicImage::ImageRgba8(crop).to_rgb8();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality).encode_image(&rgb)?;

        Ok(CapturePayload { jpeg, region })
    }
}

impl Default for CaptureEncoder {
    fn default() -> Self {
        Self::from_settings(&EncoderSettings::default())
    }
}
