//! Best-candidate selection
//!
//! Keeps rectangles shaped like a plate and picks the largest one. Ties in
//! area go to the rectangle enumerated first, so the choice is deterministic.

use super::detection::CandidateSet;
use super::geometry::Rect;
use crate::config::DetectionSettings;

/// Shape filter and area ranking for candidate rectangles
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    /// Exclusive lower bound on aspect ratio
    pub min_aspect: f64,
    /// Exclusive upper bound on aspect ratio
    pub max_aspect: f64,
    /// Exclusive lower bound on width
    pub min_width: u32,
}

impl CandidateSelector {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            min_aspect: settings.min_aspect,
            max_aspect: settings.max_aspect,
            min_width: settings.min_width,
        }
    }

    /// Whether a rectangle is plate-shaped
    pub fn accepts(&self, rect: &Rect) -> bool {
        let aspect = rect.aspect();
        aspect > self.min_aspect && aspect < self.max_aspect && rect.width() > self.min_width
    }

    /// Pick the best candidate, in the set's own coordinate space
    pub fn select(&self, candidates: &CandidateSet) -> Option<Rect> {
        let mut accepted: Vec<Rect> = candidates
            .rects()
            .iter()
            .filter(|rect| self.accepts(rect))
            .copied()
            .collect();

        // Stable: equal areas keep enumeration order
        accepted.sort_by(|a, b| b.area().cmp(&a.area()));
        accepted.first().copied()
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}
