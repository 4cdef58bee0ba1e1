//! Scanning Pipeline
//!
//! One cycle turns the current camera frame into an output frame, finds the
//! best plate candidate, and feeds the throttle. When the throttle fires the
//! crop is encoded and sent to the recognizer without waiting for the answer.
//!
//! The run loop is a single task multiplexing the refresh tick, finished
//! recognition requests, the feedback revert deadline, and cancellation, so
//! every mutation of [`PipelineState`] happens on one execution context.

pub mod feedback;
pub mod messages;
pub mod state;
pub mod throttle;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::frame::{fit_frame, Frame, RawFrame};
use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::errors::{DeviceAcquisitionError, PipelineError};
use crate::recognition::{RecognitionOutcome, Recognizer};
use crate::render::{RenderSurface, RenderView};
use crate::vision::{CandidateSelector, CaptureEncoder, Rect, RegionDetector, SearchWindow};

use feedback::FeedbackState;
use messages::{CaptureRequest, RecognitionCompleted};
use state::{PipelineState, PipelineStats, ScanStatus};

/// Result of processing one frame
#[derive(Debug)]
pub struct CycleOutcome {
    /// Output frame, absent if the device frame was unusable
    pub frame: Option<Frame>,
    /// Selected candidate in frame coordinates
    pub selection: Option<Rect>,
    /// Search window used for detection
    pub window: Option<SearchWindow>,
    /// Capture to dispatch, if the throttle fired
    pub request: Option<CaptureRequest>,
}

/// The configured detection pipeline and its run state
pub struct Pipeline {
    config: AppConfig,
    detector: RegionDetector,
    selector: CandidateSelector,
    encoder: CaptureEncoder,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self {
            detector: RegionDetector::from_settings(&config.detection),
            selector: CandidateSelector::from_settings(&config.detection),
            encoder: CaptureEncoder::from_settings(&config.encoder),
            state: PipelineState::new(&config),
            config,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.state.stats
    }

    /// Process one device frame captured for the cycle starting at `now`
    pub fn process_frame(&mut self, raw: &RawFrame, now: Instant) -> CycleOutcome {
        let capture = &self.config.capture;
        let frame = match fit_frame(raw, capture.output_width, capture.output_height, capture.crop_mode) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping unusable frame: {}", e);
                self.state.stats.failed_cycles += 1;
                self.record_selection(None, now);
                return CycleOutcome {
                    frame: None,
                    selection: None,
                    window: None,
                    request: None,
                };
            }
        };

        let window = self
            .config
            .detection
            .search_window
            .as_ref()
            .and_then(|settings| SearchWindow::centered(settings, frame.width(), frame.height()));

        let selection = match self.detector.detect(&frame, window.as_ref()) {
            Ok(candidates) => self
                .selector
                .select(&candidates)
                .map(|rect| candidates.to_frame(rect)),
            Err(e) => {
                warn!("Frame processing failed: {}", e);
                self.state.stats.failed_cycles += 1;
                None
            }
        };

        let fired = self.record_selection(selection, now);
        let request = match (fired, selection) {
            (true, Some(rect)) => self.build_request(&frame, rect, now),
            _ => None,
        };

        CycleOutcome {
            frame: Some(frame),
            selection,
            window,
            request,
        }
    }

    /// Update status and throttle for this cycle's selection; returns whether to capture
    fn record_selection(&mut self, selection: Option<Rect>, now: Instant) -> bool {
        self.state.status = if selection.is_some() {
            self.state.stats.detections += 1;
            ScanStatus::PlateDetected
        } else {
            ScanStatus::Searching
        };
        self.state.throttle.evaluate(selection.is_some(), now)
    }

    fn build_request(&mut self, frame: &Frame, rect: Rect, now: Instant) -> Option<CaptureRequest> {
        self.state.stats.captures_fired += 1;

        match self.encoder.encode(frame, rect) {
            Ok(payload) => {
                self.state.last_dispatched += 1;
                let request = CaptureRequest {
                    id: Uuid::new_v4(),
                    sequence: self.state.last_dispatched,
                    payload,
                    fired_at: now,
                };
                info!(
                    "Plate stable, capturing {}x{} at ({}, {}) [request {}]",
                    rect.width(),
                    rect.height(),
                    rect.x(),
                    rect.y(),
                    request.id
                );
                Some(request)
            }
            Err(e) => {
                warn!("Failed to encode capture: {}", e);
                self.state.stats.encode_failures += 1;
                None
            }
        }
    }

    /// Apply a finished recognition request to the feedback state
    pub fn apply_completion(&mut self, completed: &RecognitionCompleted, now: Instant) {
        if self
            .state
            .last_applied
            .is_some_and(|applied| completed.sequence < applied)
        {
            debug!(
                "Request {} finished after a newer one; applying anyway",
                completed.request_id
            );
        }

        match &completed.outcome {
            RecognitionOutcome::Recognized(text) => info!("Recognized plate '{}' [request {}]", text, completed.request_id),
            RecognitionOutcome::NoText => info!("No plate text recognized [request {}]", completed.request_id),
            RecognitionOutcome::Failed(reason) => warn!("Recognition failed [request {}]: {}", completed.request_id, reason),
        }

        self.state.feedback.apply(&completed.outcome, now);
        self.state.last_applied = Some(completed.sequence);
        self.state.stats.responses_applied += 1;
    }

    /// Revert expired feedback; returns whether anything changed
    pub fn expire_feedback(&mut self, now: Instant) -> bool {
        let reverted = self.state.feedback.expire(now);
        if reverted {
            debug!("Feedback reverted to neutral");
        }
        reverted
    }

    fn present(&self, surface: &mut dyn RenderSurface, outcome: Option<&CycleOutcome>) {
        let view = RenderView {
            frame: outcome.and_then(|o| o.frame.as_ref()),
            selection: outcome.and_then(|o| o.selection),
            search_window: outcome.and_then(|o| o.window).map(|w| w.bounds()),
            status: &self.state.status,
            feedback: self.state.feedback.state(),
        };
        surface.present(&view);
    }

    fn fail_device(
        &mut self,
        surface: &mut dyn RenderSurface,
        e: DeviceAcquisitionError,
    ) -> PipelineError {
        error!("Camera error: {}", e);
        self.state.status = ScanStatus::CameraError(e.to_string());
        self.present(surface, None);
        PipelineError::Device(e)
    }

    /// Run until cancelled, until `max_cycles` frames were processed, or until
    /// the camera fails.
    ///
    /// Recognition requests still in flight when the loop ends are detached.
    pub async fn run(
        &mut self,
        source: FrameSource,
        recognizer: Arc<dyn Recognizer>,
        surface: &mut dyn RenderSurface,
        cancel: CancellationToken,
    ) -> Result<PipelineStats, PipelineError> {
        self.state.status = ScanStatus::Initializing;
        self.state.throttle.reset();
        self.present(surface, None);

        let feed = match source.start().await {
            Ok(feed) => feed,
            Err(e) => return Err(self.fail_device(surface, e)),
        };

        let (done_tx, mut done_rx) = unbounded_channel::<RecognitionCompleted>();
        let mut ticker = tokio::time::interval(self.config.pipeline.cycle_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let max_cycles = self.config.pipeline.max_cycles;

        self.state.status = ScanStatus::Searching;
        info!("Scanning with camera '{}'", feed.label());

        loop {
            let revert_deadline = self.state.feedback.revert_deadline();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Scan cancelled");
                    break;
                }

                Some(completed) = done_rx.recv() => {
                    self.apply_completion(&completed, Instant::now());
                }

                _ = sleep_until(revert_deadline) => {
                    self.expire_feedback(Instant::now());
                }

                _ = ticker.tick() => {
                    let raw = match feed.latest() {
                        Ok(Some(raw)) => raw,
                        Ok(None) => {
                            self.state.stats.idle_cycles += 1;
                            continue;
                        }
                        Err(e) => return Err(self.fail_device(surface, e)),
                    };

                    let mut outcome = self.process_frame(&raw, Instant::now());
                    drop(raw);

                    if let Some(request) = outcome.request.take() {
                        dispatch(request, recognizer.clone(), done_tx.clone());
                    }

                    self.present(surface, Some(&outcome));
                    self.state.stats.cycles += 1;

                    if max_cycles > 0 && self.state.stats.cycles >= max_cycles {
                        info!("Reached {} cycles", max_cycles);
                        break;
                    }
                }
            }
        }

        let stats = self.state.stats;
        info!(
            "Scan finished: {} cycles, {} detections, {} captures, {} results",
            stats.cycles, stats.detections, stats.captures_fired, stats.responses_applied
        );
        Ok(stats)
    }

    /// Current feedback, for callers holding the pipeline between runs
    pub fn feedback(&self) -> &FeedbackState {
        self.state.feedback.state()
    }
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Send a capture to the recognizer in the background
fn dispatch(
    request: CaptureRequest,
    recognizer: Arc<dyn Recognizer>,
    done: UnboundedSender<RecognitionCompleted>,
) {
    tokio::spawn(async move {
        let result = recognizer.recognize(&request.payload).await;
        debug!(
            "Request {} finished {:?} after firing",
            request.id,
            request.fired_at.elapsed()
        );

        let completed = RecognitionCompleted {
            request_id: request.id,
            sequence: request.sequence,
            outcome: RecognitionOutcome::from_result(result),
        };
        // The loop may already be gone
        let _ = done.send(completed);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::{draw_plate, SyntheticCamera};
    use crate::capture::{CameraBackend, CameraDevice, CameraStream, DeviceRequest};
    use crate::errors::RecognitionError;
    use crate::pipeline::feedback::FailureReason;
    use crate::recognition::RecognitionResponse;
    use crate::vision::CapturePayload;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.capture.output_width = 400;
        config.capture.output_height = 300;
        config.throttle.detection_frame_threshold = 3;
        config.throttle.cooldown_ms = 0;
        config
    }

    fn plate_frame() -> RawFrame {
        let mut image = RgbaImage::from_pixel(400, 300, Rgba([120, 120, 120, 255]));
        draw_plate(&mut image);
        RawFrame::new(image)
    }

    fn empty_scene() -> RawFrame {
        RawFrame::new(RgbaImage::from_pixel(400, 300, Rgba([120, 120, 120, 255])))
    }

    fn completed(sequence: u64, outcome: RecognitionOutcome) -> RecognitionCompleted {
        RecognitionCompleted {
            request_id: Uuid::new_v4(),
            sequence,
            outcome,
        }
    }

    struct FixedRecognizer {
        plate: Option<String>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Recognizer for FixedRecognizer {
        async fn recognize(
            &self,
            _payload: &CapturePayload,
        ) -> Result<RecognitionResponse, RecognitionError> {
            *self.calls.lock().unwrap() += 1;
            Ok(RecognitionResponse {
                plate: self.plate.clone(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        statuses: Vec<ScanStatus>,
        feedback: Vec<FeedbackState>,
        frames_with_selection: usize,
    }

    impl RenderSurface for RecordingSurface {
        fn present(&mut self, view: &RenderView<'_>) {
            self.statuses.push(view.status.clone());
            self.feedback.push(view.feedback.clone());
            if view.frame.is_some() && view.selection.is_some() {
                self.frames_with_selection += 1;
            }
        }
    }

    #[test]
    fn test_plate_frames_fire_after_threshold() {
        let mut pipeline = Pipeline::new(test_config());
        let t0 = Instant::now();
        let raw = plate_frame();

        let first = pipeline.process_frame(&raw, t0);
        assert!(first.selection.is_some());
        assert!(first.request.is_none());
        assert_eq!(pipeline.state().status, ScanStatus::PlateDetected);

        assert!(pipeline.process_frame(&raw, t0 + Duration::from_millis(16)).request.is_none());
        let third = pipeline.process_frame(&raw, t0 + Duration::from_millis(32));
        let request = third.request.expect("third consecutive detection should capture");

        let selection = third.selection.unwrap();
        assert_eq!(request.payload.region, selection);
        assert_eq!(request.sequence, 1);
        assert_eq!(pipeline.stats().captures_fired, 1);
        assert_eq!(pipeline.state().throttle.state().consecutive_detection_frames, 0);
    }

    #[test]
    fn test_selection_is_in_frame_coordinates_with_window() {
        let mut config = test_config();
        config.detection.search_window = Some(crate::config::SearchWindowSettings {
            guide_width: 200,
            guide_height: 80,
            margin: 30,
        });
        let mut pipeline = Pipeline::new(config);

        let outcome = pipeline.process_frame(&plate_frame(), Instant::now());
        let window = outcome.window.unwrap();
        let selection = outcome.selection.unwrap();

        // The synthetic plate is 160x50 centered at (200, 150)
        assert!(selection.x() >= window.bounds().x());
        assert!(selection.x().abs_diff(120) <= 3);
        assert!(selection.y().abs_diff(125) <= 3);
    }

    #[test]
    fn test_empty_scene_resets_count() {
        let mut pipeline = Pipeline::new(test_config());
        let t0 = Instant::now();

        pipeline.process_frame(&plate_frame(), t0);
        pipeline.process_frame(&plate_frame(), t0);
        assert_eq!(pipeline.state().throttle.state().consecutive_detection_frames, 2);

        let outcome = pipeline.process_frame(&empty_scene(), t0);
        assert!(outcome.selection.is_none());
        assert_eq!(pipeline.state().status, ScanStatus::Searching);
        assert_eq!(pipeline.state().throttle.state().consecutive_detection_frames, 0);
    }

    #[test]
    fn test_processing_error_counts_as_absent_and_continues() {
        let mut pipeline = Pipeline::new(test_config());
        let t0 = Instant::now();

        pipeline.process_frame(&plate_frame(), t0);
        pipeline.process_frame(&plate_frame(), t0);

        let broken = RawFrame::new(RgbaImage::new(0, 0));
        let outcome = pipeline.process_frame(&broken, t0);
        assert!(outcome.frame.is_none());
        assert_eq!(pipeline.stats().failed_cycles, 1);
        assert_eq!(pipeline.state().throttle.state().consecutive_detection_frames, 0);

        // The next cycle proceeds normally
        let outcome = pipeline.process_frame(&plate_frame(), t0);
        assert!(outcome.selection.is_some());
        assert_eq!(pipeline.state().throttle.state().consecutive_detection_frames, 1);
    }

    #[test]
    fn test_completion_drives_feedback() {
        let mut pipeline = Pipeline::new(test_config());
        let t0 = Instant::now();

        pipeline.apply_completion(
            &completed(1, RecognitionOutcome::Recognized("ABC123".to_string())),
            t0,
        );
        assert_eq!(pipeline.feedback(), &FeedbackState::Success("ABC123".to_string()));

        let revert = Duration::from_millis(pipeline.config.feedback.revert_after_ms);
        assert!(!pipeline.expire_feedback(t0 + revert - Duration::from_millis(1)));
        assert!(pipeline.expire_feedback(t0 + revert));
        assert_eq!(pipeline.feedback(), &FeedbackState::Neutral);
    }

    #[test]
    fn test_late_older_completion_still_applies() {
        let mut pipeline = Pipeline::new(test_config());
        let t0 = Instant::now();

        pipeline.apply_completion(&completed(2, RecognitionOutcome::Recognized("NEW222".to_string())), t0);
        pipeline.apply_completion(&completed(1, RecognitionOutcome::NoText), t0);

        assert_eq!(pipeline.feedback(), &FeedbackState::Failure(FailureReason::NoText));
        assert_eq!(pipeline.state().last_applied, Some(1));
        assert_eq!(pipeline.stats().responses_applied, 2);
    }

    #[tokio::test]
    async fn test_run_captures_and_reports_recognition() {
        let mut config = test_config();
        config.pipeline.refresh_hz = 200;
        config.pipeline.max_cycles = 40;
        config.capture.max_fps = 200;

        let camera = SyntheticCamera::new(400, 300).with_schedule(1, 0);
        let source = FrameSource::new(Box::new(camera), config.capture.clone());
        let recognizer = Arc::new(FixedRecognizer {
            plate: Some("ABC123".to_string()),
            calls: Mutex::new(0),
        });
        let mut surface = RecordingSurface::default();

        let mut pipeline = Pipeline::new(config);
        let stats = pipeline
            .run(source, recognizer.clone(), &mut surface, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.cycles, 40);
        assert!(stats.detections > 0);
        assert!(stats.captures_fired >= 1);
        assert!(*recognizer.calls.lock().unwrap() >= 1);
        assert!(stats.responses_applied >= 1);
        assert!(surface.statuses.contains(&ScanStatus::PlateDetected));
        assert!(surface
            .feedback
            .contains(&FeedbackState::Success("ABC123".to_string())));
        assert!(surface.frames_with_selection > 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_device_error() {
        let config = test_config();
        let camera = SyntheticCamera::new(400, 300).deny_permission();
        let source = FrameSource::new(Box::new(camera), config.capture.clone());
        let recognizer = Arc::new(FixedRecognizer {
            plate: None,
            calls: Mutex::new(0),
        });
        let mut surface = RecordingSurface::default();

        let mut pipeline = Pipeline::new(config);
        let result = pipeline
            .run(source, recognizer, &mut surface, CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Device(DeviceAcquisitionError::PermissionDenied))
        ));
        assert!(matches!(
            surface.statuses.last(),
            Some(ScanStatus::CameraError(_))
        ));
    }

    /// Camera that unplugs after a fixed number of frames
    struct UnpluggingCamera {
        frames_left: u32,
    }

    impl CameraBackend for UnpluggingCamera {
        fn enumerate(&mut self) -> Result<Vec<CameraDevice>, DeviceAcquisitionError> {
            Ok(vec![CameraDevice {
                id: "usb-0".to_string(),
                label: "USB Back Camera".to_string(),
            }])
        }

        fn open(
            &mut self,
            _request: &DeviceRequest,
        ) -> Result<Box<dyn CameraStream>, DeviceAcquisitionError> {
            Ok(Box::new(UnpluggingCamera {
                frames_left: self.frames_left,
            }))
        }
    }

    impl CameraStream for UnpluggingCamera {
        fn label(&self) -> &str {
            "USB Back Camera"
        }

        fn next_frame(&mut self) -> Result<RawFrame, DeviceAcquisitionError> {
            if self.frames_left == 0 {
                return Err(DeviceAcquisitionError::Disconnected);
            }
            self.frames_left -= 1;
            Ok(plate_frame())
        }
    }

    #[tokio::test]
    async fn test_run_stops_when_camera_is_lost() {
        let mut config = test_config();
        config.pipeline.refresh_hz = 200;
        config.capture.max_fps = 200;

        let source = FrameSource::new(
            Box::new(UnpluggingCamera { frames_left: 5 }),
            config.capture.clone(),
        );
        let recognizer = Arc::new(FixedRecognizer {
            plate: None,
            calls: Mutex::new(0),
        });
        let mut surface = RecordingSurface::default();

        let mut pipeline = Pipeline::new(config);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run(source, recognizer, &mut surface, CancellationToken::new()),
        )
        .await
        .expect("run should end once the camera is gone");

        assert!(matches!(
            result,
            Err(PipelineError::Device(DeviceAcquisitionError::Disconnected))
        ));
        assert!(matches!(
            pipeline.state().status,
            ScanStatus::CameraError(_)
        ));
        assert!(matches!(
            surface.statuses.last(),
            Some(ScanStatus::CameraError(_))
        ));
    }

    #[tokio::test]
    async fn test_run_honours_cancellation() {
        let config = test_config();
        let camera = SyntheticCamera::new(400, 300);
        let source = FrameSource::new(Box::new(camera), config.capture.clone());
        let recognizer = Arc::new(FixedRecognizer {
            plate: None,
            calls: Mutex::new(0),
        });
        let mut surface = RecordingSurface::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut pipeline = Pipeline::new(config);
        let stats = pipeline
            .run(source, recognizer, &mut surface, cancel)
            .await
            .unwrap();
        assert_eq!(stats.cycles, 0);
    }
}
