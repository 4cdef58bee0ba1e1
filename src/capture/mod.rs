//! Camera Capture Layer
//!
//! Owns the capture device. A dedicated capture thread pulls frames from the
//! selected backend and publishes the most recent one; the frame loop reads
//! whatever frame is current when its cycle starts, the way a video element
//! exposes its current picture.

pub mod files;
pub mod frame;
pub mod synthetic;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::CaptureSettings;
use crate::errors::DeviceAcquisitionError;
use frame::RawFrame;

pub use files::ImageSequenceCamera;
pub use synthetic::SyntheticCamera;

/// A capture device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Backend-specific device identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear / environment-facing, preferred but not required
    EnvironmentPreferred,
}

/// Which device to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// A specific device identified by enumeration
    Exact(String),
    /// Whatever the backend considers default, biased by a facing hint
    Generic(Facing),
}

/// Full request handed to a backend when opening a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub selection: DeviceSelection,
    /// Preferred resolution (width, height)
    pub ideal_resolution: (u32, u32),
    /// Frame rate cap
    pub max_fps: u32,
}

/// A source of capture devices
pub trait CameraBackend: Send {
    /// List the available devices
    fn enumerate(&mut self) -> Result<Vec<CameraDevice>, DeviceAcquisitionError>;

    /// Open a device and begin streaming
    fn open(
        &mut self,
        request: &DeviceRequest,
    ) -> Result<Box<dyn CameraStream>, DeviceAcquisitionError>;
}

/// An opened device producing frames at its own rate
pub trait CameraStream: Send {
    /// Label of the device actually opened
    fn label(&self) -> &str;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<RawFrame, DeviceAcquisitionError>;
}

/// Pick the device to request.
///
/// The first device whose label contains one of `hints` (case-insensitive)
/// wins; otherwise a generic environment-facing device is requested.
pub fn select_device(devices: &[CameraDevice], hints: &[String]) -> DeviceSelection {
    let hints: Vec<String> = hints.iter().map(|h| h.to_lowercase()).collect();

    let rear = devices.iter().find(|device| {
        let label = device.label.to_lowercase();
        hints.iter().any(|hint| !hint.is_empty() && label.contains(hint.as_str()))
    });

    match rear {
        Some(device) => {
            info!("Found rear camera: {}", device.label);
            DeviceSelection::Exact(device.id.clone())
        }
        None => {
            warn!("Rear camera not found, requesting environment-facing default");
            DeviceSelection::Generic(Facing::EnvironmentPreferred)
        }
    }
}

/// Build the device request for the given settings
pub fn build_request(devices: &[CameraDevice], settings: &CaptureSettings) -> DeviceRequest {
    DeviceRequest {
        selection: select_device(devices, &settings.rear_label_hints),
        ideal_resolution: (settings.ideal_width, settings.ideal_height),
        max_fps: settings.max_fps,
    }
}

type SharedFrame = Option<Arc<RawFrame>>;

/// Owns the capture backend until the stream is started
pub struct FrameSource {
    backend: Box<dyn CameraBackend>,
    settings: CaptureSettings,
}

impl FrameSource {
    pub fn new(backend: Box<dyn CameraBackend>, settings: CaptureSettings) -> Self {
        Self { backend, settings }
    }

    /// Acquire the device and start streaming.
    ///
    /// Device selection and opening happen on the capture thread; this
    /// resolves once that thread reports readiness or failure.
    pub async fn start(self) -> Result<FrameFeed, DeviceAcquisitionError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (frame_tx, frame_rx) = watch::channel::<SharedFrame>(None);

        let FrameSource {
            mut backend,
            settings,
        } = self;

        std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let opened = backend.enumerate().and_then(|devices| {
                    let request = build_request(&devices, &settings);
                    debug!("Opening camera with {:?}", request);
                    backend.open(&request)
                });

                let mut stream = match opened {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if ready_tx.send(Ok(stream.label().to_string())).is_err() {
                    return;
                }

                run_capture(stream.as_mut(), &frame_tx, settings.max_fps);
            })
            .map_err(|e| DeviceAcquisitionError::Unavailable(e.to_string()))?;

        let label = ready_rx
            .await
            .map_err(|_| DeviceAcquisitionError::Unavailable("capture thread exited".to_string()))??;

        info!("Camera started: {}", label);
        Ok(FrameFeed {
            label,
            frames: frame_rx,
        })
    }
}

/// Capture thread body: publish frames until the device fails or nobody listens
fn run_capture(stream: &mut dyn CameraStream, frames: &watch::Sender<SharedFrame>, max_fps: u32) {
    let min_interval = (max_fps > 0).then(|| Duration::from_secs_f64(1.0 / max_fps as f64));

    loop {
        let frame = match stream.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Camera stream ended: {}", e);
                return;
            }
        };

        if frames.send(Some(Arc::new(frame))).is_err() {
            debug!("Frame consumer gone, stopping capture");
            return;
        }

        if let Some(interval) = min_interval {
            std::thread::sleep(interval);
        }
    }
}

/// Receiving side of a started frame source
pub struct FrameFeed {
    label: String,
    frames: watch::Receiver<SharedFrame>,
}

impl FrameFeed {
    /// Label of the device in use
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The most recent frame, or `None` while the device has not produced one.
    ///
    /// Fails once the capture thread has stopped.
    pub fn latest(&self) -> Result<Option<Arc<RawFrame>>, DeviceAcquisitionError> {
        if self.frames.has_changed().is_err() {
            return Err(DeviceAcquisitionError::Disconnected);
        }
        Ok(self.frames.borrow().clone())
    }
}
