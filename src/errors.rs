//! Error types for the scanner
//!
//! Only device acquisition is fatal to the pipeline; every other error is
//! contained within the cycle or request that produced it.

use thiserror::Error;

/// Failure to acquire (or keep) the capture device
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAcquisitionError {
    /// The user or platform refused camera access
    #[error("camera permission denied")]
    PermissionDenied,
    /// No capture device is present
    #[error("no camera device found")]
    NoDevice,
    /// A device exists but could not be opened
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// The device stopped producing frames after it was opened
    #[error("camera disconnected")]
    Disconnected,
}

/// Failure to process a single frame
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameProcessingError {
    /// The frame (or requested output) has a zero dimension
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    /// The search window does not intersect the frame
    #[error("search window {x},{y} {width}x{height} lies outside the {frame_width}x{frame_height} frame")]
    WindowOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Failure to turn a selected region into a transmittable payload
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The region does not overlap the frame
    #[error("capture region lies outside the frame")]
    EmptyRegion,
    /// JPEG encoding failed
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure of a recognition request
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Network or protocol failure
    #[error("recognition request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status
    #[error("recognition service returned status {0}")]
    Status(u16),
    /// The response body was not understood
    #[error("malformed recognition response: {0}")]
    Decode(String),
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceAcquisitionError),
}
