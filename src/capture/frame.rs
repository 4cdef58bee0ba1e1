//! Frame data structures for captured camera content

use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::time::Instant;

use crate::config::CropMode;
use crate::errors::FrameProcessingError;

/// A frame as delivered by the capture device, at device resolution
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// RGBA pixel data
    pub image: RgbaImage,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl RawFrame {
    /// Wrap an image captured now
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A frame at the fixed output size, owned by one pipeline cycle
#[derive(Debug)]
pub struct Frame {
    image: RgbaImage,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbaImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Source region of a device frame that maps onto the output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centered source crop whose aspect ratio matches the output.
///
/// Wider sources lose columns on both sides, taller sources lose rows on top
/// and bottom. The result always has non-zero size when the inputs do.
pub fn crop_region(in_w: u32, in_h: u32, out_w: u32, out_h: u32) -> CropRegion {
    let target = out_w as f64 / out_h as f64;
    let src = in_w as f64 / in_h as f64;

    if src > target {
        let width = ((in_h as f64 * target).round() as u32).clamp(1, in_w);
        CropRegion {
            x: (in_w - width) / 2,
            y: 0,
            width,
            height: in_h,
        }
    } else {
        let height = ((in_w as f64 / target).round() as u32).clamp(1, in_h);
        CropRegion {
            x: 0,
            y: (in_h - height) / 2,
            width: in_w,
            height,
        }
    }
}

/// Map a device frame onto the fixed output size.
///
/// Recomputed for every frame since devices may change resolution mid-stream.
pub fn fit_frame(
    raw: &RawFrame,
    out_w: u32,
    out_h: u32,
    mode: CropMode,
) -> Result<Frame, FrameProcessingError> {
    let (in_w, in_h) = raw.dimensions();
    if in_w == 0 || in_h == 0 {
        return Err(FrameProcessingError::EmptyFrame {
            width: in_w,
            height: in_h,
        });
    }
    if out_w == 0 || out_h == 0 {
        return Err(FrameProcessingError::EmptyFrame {
            width: out_w,
            height: out_h,
        });
    }

    let region = match mode {
        CropMode::Fill => crop_region(in_w, in_h, out_w, out_h),
        CropMode::Stretch => CropRegion {
            x: 0,
            y: 0,
            width: in_w,
            height: in_h,
        },
    };

    let view = imageops::crop_imm(&raw.image, region.x, region.y, region.width, region.height);
    let image = if (region.width, region.height) == (out_w, out_h) {
        view.to_image()
    } else {
        imageops::resize(&*view, out_w, out_h, FilterType::Triangle)
    };

    Ok(Frame::new(image, raw.captured_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_wide_source() {
        // 16:9 into 4:3 drops columns on both sides
        let region = crop_region(1280, 720, 640, 480);
        assert_eq!(
            region,
            CropRegion {
                x: 160,
                y: 0,
                width: 960,
                height: 720
            }
        );
    }

    #[test]
    fn test_crop_tall_source() {
        // Portrait 3:4 into 4:3 drops rows top and bottom
        let region = crop_region(480, 640, 640, 480);
        assert_eq!(
            region,
            CropRegion {
                x: 0,
                y: 140,
                width: 480,
                height: 360
            }
        );
    }

    #[test]
    fn test_crop_matching_aspect_is_identity() {
        let region = crop_region(1280, 960, 640, 480);
        assert_eq!(
            region,
            CropRegion {
                x: 0,
                y: 0,
                width: 1280,
                height: 960
            }
        );
    }

    #[test]
    fn test_fit_frame_fills_output() {
        let raw = RawFrame::new(RgbaImage::from_pixel(1280, 720, Rgba([10, 20, 30, 255])));
        let frame = fit_frame(&raw, 640, 480, CropMode::Fill).unwrap();

        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert_eq!(frame.captured_at(), raw.captured_at);
        assert_eq!(frame.image().get_pixel(320, 240), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_fit_frame_keeps_center_content() {
        // Left and right quarters are red, the middle is blue; the crop keeps only blue
        let raw = RawFrame::new(RgbaImage::from_fn(1280, 720, |x, _| {
            if (160..1120).contains(&x) {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        }));
        let frame = fit_frame(&raw, 640, 480, CropMode::Fill).unwrap();

        assert_eq!(frame.image().get_pixel(0, 240)[2], 255);
        assert_eq!(frame.image().get_pixel(639, 240)[2], 255);
    }

    #[test]
    fn test_fit_frame_stretch_keeps_everything() {
        let raw = RawFrame::new(RgbaImage::from_fn(1280, 720, |x, _| {
            if x < 8 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }));
        let frame = fit_frame(&raw, 640, 480, CropMode::Stretch).unwrap();

        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert_eq!(frame.image().get_pixel(0, 240)[0], 255);
    }

    #[test]
    fn test_fit_frame_rejects_empty() {
        let raw = RawFrame::new(RgbaImage::new(0, 0));
        let result = fit_frame(&raw, 640, 480, CropMode::Fill);
        assert!(matches!(result, Err(FrameProcessingError::EmptyFrame { .. })));
    }
}
