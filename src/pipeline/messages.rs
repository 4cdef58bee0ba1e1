//! Messages between the frame loop and in-flight recognition requests

use std::time::Instant;
use uuid::Uuid;

use crate::recognition::RecognitionOutcome;
use crate::vision::CapturePayload;

/// A capture the throttle let through, ready to dispatch
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Correlation id for logs
    pub id: Uuid,
    /// Dispatch order within the run
    pub sequence: u64,
    /// Encoded crop
    pub payload: CapturePayload,
    /// When the throttle fired
    pub fired_at: Instant,
}

/// A finished recognition request, reported back to the frame loop
#[derive(Debug, Clone)]
pub struct RecognitionCompleted {
    pub request_id: Uuid,
    pub sequence: u64,
    pub outcome: RecognitionOutcome,
}
