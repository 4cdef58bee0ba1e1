//! Rectangles and coordinate spaces
//!
//! Rectangles produced inside a search window are window-local; they must be
//! moved into frame coordinates with [`SearchWindow::to_frame`] before being
//! cropped or drawn.

use crate::config::SearchWindowSettings;

/// Axis-aligned rectangle with strictly positive size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    /// Returns `None` for zero width or height
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// width / height
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Move by `(dx, dy)`
    pub fn translate(&self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Move by `(-dx, -dy)`; `None` if that would leave the positive quadrant
    pub fn untranslate(&self, dx: u32, dy: u32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_sub(dx)?,
            y: self.y.checked_sub(dy)?,
            ..*self
        })
    }

    /// Clip to a `width` x `height` area anchored at the origin
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let right = (self.x + self.width).min(width);
        let bottom = (self.y + self.height).min(height);
        Rect::new(self.x, self.y, right - self.x, bottom - self.y)
    }
}

/// Sub-region of the frame that detection is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    bounds: Rect,
}

impl SearchWindow {
    /// Window around a guide box centered in a `frame_w` x `frame_h` frame,
    /// grown by `margin` on every side and clipped to the frame.
    pub fn centered(settings: &SearchWindowSettings, frame_w: u32, frame_h: u32) -> Option<Self> {
        let guide_x = frame_w.saturating_sub(settings.guide_width) / 2;
        let guide_y = frame_h.saturating_sub(settings.guide_height) / 2;

        let x = guide_x.saturating_sub(settings.margin);
        let y = guide_y.saturating_sub(settings.margin);
        let right = (guide_x + settings.guide_width + settings.margin).min(frame_w);
        let bottom = (guide_y + settings.guide_height + settings.margin).min(frame_h);

        let bounds = Rect::new(x, y, right.checked_sub(x)?, bottom.checked_sub(y)?)?;
        Some(Self { bounds })
    }

    /// Window with explicit frame-space bounds
    pub fn from_bounds(bounds: Rect) -> Self {
        Self { bounds }
    }

    /// Window bounds in frame coordinates
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.bounds.x, self.bounds.y)
    }

    /// Window-local rectangle to frame coordinates
    pub fn to_frame(&self, local: Rect) -> Rect {
        local.translate(self.bounds.x, self.bounds.y)
    }

    /// Frame rectangle to window-local coordinates
    pub fn to_local(&self, global: Rect) -> Option<Rect> {
        global.untranslate(self.bounds.x, self.bounds.y)
    }
}
