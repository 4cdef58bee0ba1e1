//! Recognition feedback
//!
//! Turns asynchronous recognition outcomes into a transient status that the
//! rendering surface shows until a fixed revert delay elapses.
//!
//! Every applied outcome replaces the pending revert deadline, so a revert
//! scheduled for an older result can never clear a newer one.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::recognition::RecognitionOutcome;

/// Text shown when the service found no plate text
pub const NO_TEXT_DETECTED: &str = "No text detected";
/// Text shown when the request itself failed
pub const API_ERROR: &str = "API error";

/// Why a recognition did not produce text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The service answered without plate text
    NoText,
    /// The request failed (network, status, decoding)
    RequestFailed(String),
}

impl FailureReason {
    /// Status text for display
    pub fn display_text(&self) -> &'static str {
        match self {
            FailureReason::NoText => NO_TEXT_DETECTED,
            FailureReason::RequestFailed(_) => API_ERROR,
        }
    }
}

/// What the viewer is currently shown about recognition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedbackState {
    #[default]
    Neutral,
    Success(String),
    Failure(FailureReason),
}

impl FeedbackState {
    /// Text for the status line, if any
    pub fn display_text(&self) -> Option<&str> {
        match self {
            FeedbackState::Neutral => None,
            FeedbackState::Success(text) => Some(text.as_str()),
            FeedbackState::Failure(reason) => Some(reason.display_text()),
        }
    }
}

/// Small state machine driven by responses and a revert timer
#[derive(Debug, Clone)]
pub struct FeedbackController {
    state: FeedbackState,
    revert_at: Option<Instant>,
    revert_after: Duration,
}

impl FeedbackController {
    pub fn new(revert_after: Duration) -> Self {
        Self {
            state: FeedbackState::Neutral,
            revert_at: None,
            revert_after,
        }
    }

    pub fn state(&self) -> &FeedbackState {
        &self.state
    }

    /// When the current result will revert to neutral, if one is pending
    pub fn revert_deadline(&self) -> Option<Instant> {
        self.revert_at
    }

    /// Apply a recognition outcome received at `now`
    pub fn apply(&mut self, outcome: &RecognitionOutcome, now: Instant) {
        self.state = match outcome {
            RecognitionOutcome::Recognized(text) => FeedbackState::Success(text.clone()),
            RecognitionOutcome::NoText => FeedbackState::Failure(FailureReason::NoText),
            RecognitionOutcome::Failed(reason) => {
                FeedbackState::Failure(FailureReason::RequestFailed(reason.clone()))
            }
        };

        if let Some(previous) = self.revert_at.replace(now + self.revert_after) {
            debug!("Superseding revert pending at {:?}", previous);
        }
    }

    /// Revert to neutral if the deadline has passed; returns whether it did
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.revert_at {
            Some(deadline) if now >= deadline => {
                self.revert_at = None;
                self.state = FeedbackState::Neutral;
                true
            }
            _ => false,
        }
    }
}
