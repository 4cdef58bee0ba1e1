//! Candidate region detection
//!
//! Grayscale conversion, Canny edge detection on the unsmoothed Sobel
//! gradient and contour tracing, reduced to one axis-aligned bounding
//! rectangle per contour. The grayscale and edge buffers live only for the
//! duration of a `detect` call and are released on every exit path, error
//! returns included.

use image::imageops;
use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::point::Point;
use std::time::Instant;
use tracing::trace;

use super::edges::canny_l1;
use super::geometry::{Rect, SearchWindow};
use crate::capture::frame::Frame;
use crate::config::DetectionSettings;
use crate::errors::FrameProcessingError;

/// Rectangles found in one frame, in contour enumeration order.
///
/// When produced inside a search window the rectangles are window-local.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    rects: Vec<Rect>,
    window: Option<SearchWindow>,
}

impl CandidateSet {
    pub fn new(rects: Vec<Rect>, window: Option<SearchWindow>) -> Self {
        Self { rects, window }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Express a rectangle of this set in frame coordinates
    pub fn to_frame(&self, rect: Rect) -> Rect {
        match &self.window {
            Some(window) => window.to_frame(rect),
            None => rect,
        }
    }
}

/// Edge/contour based rectangle detector
#[derive(Debug, Clone)]
pub struct RegionDetector {
    canny_low: f32,
    canny_high: f32,
}

impl RegionDetector {
    pub fn new(canny_low: f32, canny_high: f32) -> Self {
        Self {
            canny_low,
            canny_high,
        }
    }

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self::new(settings.canny_low, settings.canny_high)
    }

    /// Detect candidate rectangles in the frame, or only inside `window`
    pub fn detect(
        &self,
        frame: &Frame,
        window: Option<&SearchWindow>,
    ) -> Result<CandidateSet, FrameProcessingError> {
        let (frame_w, frame_h) = (frame.width(), frame.height());
        if frame_w == 0 || frame_h == 0 {
            return Err(FrameProcessingError::EmptyFrame {
                width: frame_w,
                height: frame_h,
            });
        }

        let start = Instant::now();

        let gray: GrayImage = match window {
            Some(window) => {
                let bounds = window.bounds();
                let clipped = bounds.clamp_to(frame_w, frame_h).ok_or(
                    FrameProcessingError::WindowOutOfBounds {
                        x: bounds.x(),
                        y: bounds.y(),
                        width: bounds.width(),
                        height: bounds.height(),
                        frame_width: frame_w,
                        frame_height: frame_h,
                    },
                )?;
                let view = imageops::crop_imm(
                    frame.image(),
                    clipped.x(),
                    clipped.y(),
                    clipped.width(),
                    clipped.height(),
                );
                imageops::grayscale(&*view)
            }
            None => imageops::grayscale(frame.image()),
        };

        let rects = self.contour_bounds(&gray);

        trace!(
            "Detected {} contours in {:?}",
            rects.len(),
            start.elapsed()
        );

        Ok(CandidateSet::new(rects, window.copied()))
    }

    fn contour_bounds(&self, gray: &GrayImage) -> Vec<Rect> {
        let edges = canny_l1(gray, self.canny_low, self.canny_high);
        find_contours::<i32>(&edges)
            .iter()
            .filter_map(|contour| bounding_rect(&contour.points))
            .collect()
    }
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}

/// Smallest upright rectangle containing every point (inclusive pixel bounds)
fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    if min_x < 0 || min_y < 0 {
        return None;
    }

    Rect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}
