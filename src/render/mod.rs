//! Rendering Boundary
//!
//! Once per cycle the pipeline hands a [`RenderView`] to a surface, which is
//! free to draw it, log it, or ignore it. Surfaces never feed back into the
//! pipeline.

pub mod snapshot;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;
use tracing::info;

use crate::capture::frame::Frame;
use crate::pipeline::feedback::FeedbackState;
use crate::pipeline::state::ScanStatus;
use crate::vision::Rect;

pub use snapshot::SnapshotWriter;

/// Neutral highlight
pub const NEUTRAL_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Highlight after recognized text
pub const SUCCESS_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);
/// Highlight after a failed recognition
pub const FAILURE_COLOR: Rgba<u8> = Rgba([255, 140, 0, 255]);
const WINDOW_COLOR: Rgba<u8> = Rgba([160, 160, 160, 255]);

/// Everything a surface needs to present one cycle
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    /// Current output frame, absent when the camera failed
    pub frame: Option<&'a Frame>,
    /// Selected candidate in frame coordinates
    pub selection: Option<Rect>,
    /// Search window bounds in frame coordinates
    pub search_window: Option<Rect>,
    pub status: &'a ScanStatus,
    pub feedback: &'a FeedbackState,
}

/// Consumer of per-cycle render views
pub trait RenderSurface {
    fn present(&mut self, view: &RenderView<'_>);
}

impl RenderSurface for Vec<Box<dyn RenderSurface>> {
    fn present(&mut self, view: &RenderView<'_>) {
        for surface in self.iter_mut() {
            surface.present(view);
        }
    }
}

/// Highlight color for the selected candidate
pub fn highlight_color(feedback: &FeedbackState) -> Rgba<u8> {
    match feedback {
        FeedbackState::Neutral => NEUTRAL_COLOR,
        FeedbackState::Success(_) => SUCCESS_COLOR,
        FeedbackState::Failure(_) => FAILURE_COLOR,
    }
}

fn draw_rect(image: &mut RgbaImage, rect: Rect, thickness: u32, color: Rgba<u8>) {
    for inset in 0..thickness {
        let width = rect.width().saturating_sub(2 * inset);
        let height = rect.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let outline = DrawRect::at((rect.x() + inset) as i32, (rect.y() + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(image, outline, color);
    }
}

/// Copy of the frame with the search window and highlighted selection drawn on
pub fn annotate(frame: &Frame, view: &RenderView<'_>) -> RgbaImage {
    let mut image = frame.image().clone();
    if let Some(window) = view.search_window {
        draw_rect(&mut image, window, 1, WINDOW_COLOR);
    }
    if let Some(selection) = view.selection {
        draw_rect(&mut image, selection, 2, highlight_color(view.feedback));
    }
    image
}

/// Surface that logs status and feedback transitions
#[derive(Debug, Default)]
pub struct StatusLog {
    last_status: Option<ScanStatus>,
    last_feedback: Option<FeedbackState>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSurface for StatusLog {
    fn present(&mut self, view: &RenderView<'_>) {
        if self.last_status.as_ref() != Some(view.status) {
            match view.status {
                ScanStatus::CameraError(reason) => info!("Status: {} ({})", view.status, reason),
                status => info!("Status: {}", status),
            }
            self.last_status = Some(view.status.clone());
        }

        if self.last_feedback.as_ref() != Some(view.feedback) {
            match view.feedback.display_text() {
                Some(text) => info!("Detected plate: {}", text),
                None if self.last_feedback.is_some() => info!("Detected plate: (cleared)"),
                None => {}
            }
            self.last_feedback = Some(view.feedback.clone());
        }
    }
}
