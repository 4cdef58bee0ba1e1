//! Capture throttling
//!
//! A capture fires only after a candidate has been seen on enough consecutive
//! frames AND the cooldown since the previous capture has elapsed. Both gates
//! re-arm together when a capture fires.

use std::time::{Duration, Instant};

use crate::config::ThrottleSettings;

/// Mutable throttle state for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleState {
    /// Frames in a row that had a selected candidate
    pub consecutive_detection_frames: u32,
    /// When the last capture fired; `None` means never
    pub last_capture: Option<Instant>,
}

/// Debounce plus cooldown gate
#[derive(Debug, Clone)]
pub struct CaptureThrottler {
    detection_frame_threshold: u32,
    cooldown: Duration,
    state: ThrottleState,
}

impl CaptureThrottler {
    pub fn new(detection_frame_threshold: u32, cooldown: Duration) -> Self {
        Self {
            detection_frame_threshold,
            cooldown,
            state: ThrottleState::default(),
        }
    }

    pub fn from_settings(settings: &ThrottleSettings) -> Self {
        Self::new(settings.detection_frame_threshold, settings.cooldown())
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// Feed one frame's outcome; returns whether a capture should fire now
    pub fn evaluate(&mut self, has_candidate: bool, now: Instant) -> bool {
        if !has_candidate {
            self.state.consecutive_detection_frames = 0;
            return false;
        }

        self.state.consecutive_detection_frames =
            self.state.consecutive_detection_frames.saturating_add(1);

        let debounced = self.state.consecutive_detection_frames >= self.detection_frame_threshold;
        let cooled_down = match self.state.last_capture {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        };

        if debounced && cooled_down {
            self.state.consecutive_detection_frames = 0;
            self.state.last_capture = Some(now);
            return true;
        }

        false
    }

    /// Back to the initial `{0, never}` state
    pub fn reset(&mut self) {
        self.state = ThrottleState::default();
    }
}
