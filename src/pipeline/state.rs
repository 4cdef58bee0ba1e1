//! Pipeline state owned by one pipeline instance
//!
//! Everything the frame loop and the recognition callbacks mutate lives here,
//! so it can be inspected and tested without a rendering surface.

use std::fmt;
use std::time::Duration;

use super::feedback::FeedbackController;
use super::throttle::CaptureThrottler;
use crate::config::AppConfig;

/// Detection status shown alongside the video
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanStatus {
    /// Waiting for the camera
    #[default]
    Initializing,
    /// Frames are processed but no candidate is selected
    Searching,
    /// A candidate is selected in the current frame
    PlateDetected,
    /// The camera could not be acquired or was lost
    CameraError(String),
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Initializing => write!(f, "Initializing..."),
            ScanStatus::Searching => write!(f, "No plate detected"),
            ScanStatus::PlateDetected => write!(f, "Possible plate detected"),
            ScanStatus::CameraError(_) => write!(f, "Camera error"),
        }
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Cycles that processed a frame
    pub cycles: u64,
    /// Cycles skipped because no frame was available yet
    pub idle_cycles: u64,
    /// Cycles abandoned due to a frame processing error
    pub failed_cycles: u64,
    /// Cycles that selected a candidate
    pub detections: u64,
    /// Captures the throttle let through
    pub captures_fired: u64,
    /// Captures dropped because encoding failed
    pub encode_failures: u64,
    /// Recognition results applied to feedback
    pub responses_applied: u64,
}

/// Mutable state of a running pipeline
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub throttle: CaptureThrottler,
    pub feedback: FeedbackController,
    pub status: ScanStatus,
    pub stats: PipelineStats,
    /// Sequence number of the last capture dispatched
    pub last_dispatched: u64,
    /// Sequence number of the last recognition result applied
    pub last_applied: Option<u64>,
}

impl PipelineState {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_timing(
            CaptureThrottler::from_settings(&config.throttle),
            config.feedback.revert_after(),
        )
    }

    pub fn with_timing(throttle: CaptureThrottler, revert_after: Duration) -> Self {
        Self {
            throttle,
            feedback: FeedbackController::new(revert_after),
            status: ScanStatus::Initializing,
            stats: PipelineStats::default(),
            last_dispatched: 0,
            last_applied: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::feedback::FeedbackState;
    use crate::pipeline::throttle::ThrottleState;

    #[test]
    fn test_status_text() {
        assert_eq!(ScanStatus::Initializing.to_string(), "Initializing...");
        assert_eq!(ScanStatus::Searching.to_string(), "No plate detected");
        assert_eq!(ScanStatus::PlateDetected.to_string(), "Possible plate detected");
        assert_eq!(
            ScanStatus::CameraError("denied".to_string()).to_string(),
            "Camera error"
        );
    }

    #[test]
    fn test_new_state_starts_clean() {
        let state = PipelineState::new(&AppConfig::default());
        assert_eq!(state.throttle.state(), ThrottleState::default());
        assert_eq!(state.feedback.state(), &FeedbackState::Neutral);
        assert_eq!(state.status, ScanStatus::Initializing);
        assert_eq!(state.stats, PipelineStats::default());
    }
}
