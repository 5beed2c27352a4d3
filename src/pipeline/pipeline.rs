use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::config::CaptureConfig;
use crate::error::{CaptureError, ConfigError};
use crate::helper::face_helper::{calculate_dp, is_face_centered, is_valid_frame, DEFAULT_CENTER_TOLERANCE};
use crate::helper::face_shape::{classify_face_shape, FaceShapeResult};
use crate::modules::detector::{estimate_detection_confidence, first_face, LandmarkDetector};
use crate::pipeline::aggregation::process_landmarks_samples;
use crate::utils::coordinate::LandmarkSet;
use crate::utils::statistics::{median_with_iqr, DEFAULT_IQR_MULTIPLIER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Idle,
    Initializing,
    Ready,
    Capturing,
    Processing,
    Success,
    Error,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStatus::Idle => "idle",
            CaptureStatus::Initializing => "initializing",
            CaptureStatus::Ready => "ready",
            CaptureStatus::Capturing => "capturing",
            CaptureStatus::Processing => "processing",
            CaptureStatus::Success => "success",
            CaptureStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the frame loop should do after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Schedule the next frame.
    Continue,
    /// The capture finished during this iteration.
    Finished,
    /// The session is not capturing; nothing was done.
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Timeout,
    TargetReached,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DpMeasurement {
    pub value: f32,
    pub confidence: u8,
    pub valid_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnalysisResult {
    pub dp: DpMeasurement,
    pub face_shape: FaceShapeResult,
    pub captured_at: DateTime<Utc>,
}

/// Live view of a session, published once per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub status: CaptureStatus,
    /// 0..=100
    pub progress: u8,
    pub valid_samples: usize,
    pub is_frontal: bool,
    pub is_centered: bool,
    pub error: Option<String>,
    pub result: Option<FaceAnalysisResult>,
}

/// CaptureSession collects landmark samples from a detector and turns them
/// into a [`FaceAnalysisResult`].
///
/// The session is driven one frame at a time through [`process_frame`]. Its
/// status is a plain field, so a stop or reset is observed by the very next
/// call. The detector is released on [`teardown`] or drop, whatever the state.
///
/// [`process_frame`]: CaptureSession::process_frame
/// [`teardown`]: CaptureSession::teardown
pub struct CaptureSession<D: LandmarkDetector> {
    config: CaptureConfig,
    detector: Option<D>,
    status: CaptureStatus,
    samples: Vec<LandmarkSet>,
    progress: u8,
    is_frontal: bool,
    is_centered: bool,
    result: Option<FaceAnalysisResult>,
    error: Option<CaptureError>,
    started_at: Option<Instant>,
    epoch: Instant,
    last_timestamp_ms: f64,
}

impl<D: LandmarkDetector> CaptureSession<D> {

    /// new creates an idle session without a detector.
    pub fn new(config: CaptureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(CaptureSession {
            samples: Vec::with_capacity(config.target_samples),
            config,
            detector: None,
            status: CaptureStatus::Idle,
            progress: 0,
            is_frontal: false,
            is_centered: false,
            result: None,
            error: None,
            started_at: None,
            epoch: Instant::now(),
            last_timestamp_ms: 0.0,
        })
    }

    /// with_detector creates a session around an already loaded detector.
    pub fn with_detector(config: CaptureConfig, detector: D) -> Result<Self, ConfigError> {
        let mut session = CaptureSession::new(config)?;
        session.detector = Some(detector);
        session.status = CaptureStatus::Ready;
        Ok(session)
    }

    /// initialize loads the detector. A load failure is fatal: the session
    /// moves to `Error` and must be rebuilt.
    ///
    /// # Arguments
    /// * `loader` - future resolving to the loaded detector
    ///
    /// # Returns
    /// * `Result<(), CaptureError>`
    pub async fn initialize<F>(&mut self, loader: F) -> Result<(), CaptureError>
    where
        F: Future<Output = Result<D, Error>>,
    {
        self.begin_initialization()?;
        let loaded = loader.await;
        self.finish_initialization(loaded)
    }

    pub(crate) fn begin_initialization(&mut self) -> Result<(), CaptureError> {
        if self.status != CaptureStatus::Idle {
            warn!(status = %self.status, "initialization requested twice");
            return Err(CaptureError::InvalidTransition { action: "initialize", status: self.status });
        }
        info!("loading face landmark model");
        self.status = CaptureStatus::Initializing;
        Ok(())
    }

    pub(crate) fn finish_initialization(&mut self, loaded: Result<D, Error>) -> Result<(), CaptureError> {
        match loaded {
            Ok(detector) => {
                info!("face landmark model loaded");
                self.detector = Some(detector);
                self.status = CaptureStatus::Ready;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to load face landmark model");
                let err = CaptureError::ModelLoad(e.to_string());
                self.status = CaptureStatus::Error;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// start_capture clears the previous attempt and starts collecting
    /// samples. Allowed from `Ready`, `Success` and `Error` with a loaded
    /// detector.
    pub fn start_capture(&mut self, now: Instant) -> Result<(), CaptureError> {
        if self.detector.is_none() {
            return Err(CaptureError::DetectorUnavailable);
        }
        match self.status {
            CaptureStatus::Ready | CaptureStatus::Success | CaptureStatus::Error => {}
            status => {
                warn!(%status, "cannot start capture");
                return Err(CaptureError::InvalidTransition { action: "start capture", status });
            }
        }

        info!(
            target_samples = self.config.target_samples,
            max_capture_time_ms = self.config.max_capture_time_ms,
            "starting capture"
        );
        self.clear();
        self.started_at = Some(now);
        self.status = CaptureStatus::Capturing;
        Ok(())
    }

    /// process_frame runs one iteration of the capture loop.
    ///
    /// Timeout and target checks come first and finalize the capture. Otherwise
    /// the frame goes through the detector; a valid face is appended to the
    /// samples. Detector errors are logged and treated as "no face".
    ///
    /// # Arguments
    /// * `frame` - the current frame, `None` when the camera had none ready
    /// * `now` - wall clock of this iteration
    ///
    /// # Returns
    /// * `FrameOutcome`
    pub fn process_frame(&mut self, frame: Option<&D::Frame>, now: Instant) -> FrameOutcome {
        if self.status != CaptureStatus::Capturing {
            return FrameOutcome::Inactive;
        }
        let Some(started_at) = self.started_at else {
            return FrameOutcome::Inactive;
        };

        let elapsed = now.saturating_duration_since(started_at);
        if elapsed > Duration::from_millis(self.config.max_capture_time_ms) {
            info!(elapsed_ms = elapsed.as_millis() as u64, samples = self.samples.len(), "capture timed out");
            self.finalize(FinishReason::Timeout);
            return FrameOutcome::Finished;
        }

        if self.samples.len() >= self.config.target_samples {
            info!(samples = self.samples.len(), "sample target reached");
            self.finalize(FinishReason::TargetReached);
            return FrameOutcome::Finished;
        }

        let Some(frame) = frame else {
            debug!("no frame available");
            return FrameOutcome::Continue;
        };

        let timestamp_ms = self.next_timestamp_ms(now);
        let Some(detector) = self.detector.as_mut() else {
            return FrameOutcome::Inactive;
        };

        let face = match detector.detect(frame, timestamp_ms) {
            Ok(faces) => first_face(faces),
            Err(e) => {
                warn!(error = %e, "frame detection failed, skipping frame");
                None
            }
        };

        match face {
            Some(landmarks) => self.observe_face(landmarks),
            None => {
                self.is_frontal = false;
                self.is_centered = false;
            }
        }
        FrameOutcome::Continue
    }

    /// stop_capture ends a running capture. With enough samples the capture
    /// is finalized, otherwise it is cancelled and the samples are discarded.
    pub fn stop_capture(&mut self) {
        if self.status != CaptureStatus::Capturing {
            debug!(status = %self.status, "stop ignored");
            return;
        }

        if self.samples.len() >= self.config.min_valid_samples {
            self.finalize(FinishReason::Stopped);
            return;
        }

        info!(samples = self.samples.len(), "capture cancelled");
        self.samples.clear();
        self.progress = 0;
        self.started_at = None;
        self.status = CaptureStatus::Ready;
        self.error = Some(CaptureError::Cancelled);
    }

    /// reset clears samples, flags, result and error and returns to `Ready`.
    ///
    /// A session without a loaded detector (never initialized, failed to load
    /// or torn down) cannot become `Ready` and fails with
    /// `DetectorUnavailable` instead.
    pub fn reset(&mut self) -> Result<(), CaptureError> {
        if self.status == CaptureStatus::Initializing {
            return Err(CaptureError::InvalidTransition { action: "reset", status: self.status });
        }
        if self.detector.is_none() {
            return Err(CaptureError::DetectorUnavailable);
        }
        debug!(status = %self.status, "resetting session");
        self.clear();
        self.status = CaptureStatus::Ready;
        Ok(())
    }

    /// teardown releases the detector. Safe to call more than once.
    ///
    /// A capture in flight is abandoned: its samples are dropped and the
    /// session goes back to `Idle`, as does a `Ready` session. `Success` and
    /// `Error` keep their result or error readable.
    pub fn teardown(&mut self) {
        self.started_at = None;
        match self.status {
            CaptureStatus::Capturing | CaptureStatus::Processing => {
                info!(samples = self.samples.len(), "capture abandoned on teardown");
                self.samples.clear();
                self.progress = 0;
                self.is_frontal = false;
                self.is_centered = false;
                self.status = CaptureStatus::Idle;
            }
            CaptureStatus::Ready => self.status = CaptureStatus::Idle,
            _ => {}
        }
        if let Some(mut detector) = self.detector.take() {
            detector.close();
            info!(status = %self.status, "face landmark model released");
        }
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            status: self.status,
            progress: self.progress,
            valid_samples: self.samples.len(),
            is_frontal: self.is_frontal,
            is_centered: self.is_centered,
            error: self.error.as_ref().map(|e| e.to_string()),
            result: self.result.clone(),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn valid_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_frontal(&self) -> bool {
        self.is_frontal
    }

    pub fn is_centered(&self) -> bool {
        self.is_centered
    }

    pub fn result(&self) -> Option<&FaceAnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&CaptureError> {
        self.error.as_ref()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.progress = 0;
        self.is_frontal = false;
        self.is_centered = false;
        self.result = None;
        self.error = None;
        self.started_at = None;
    }

    fn next_timestamp_ms(&mut self, now: Instant) -> f64 {
        let mut timestamp_ms = now.saturating_duration_since(self.epoch).as_secs_f64() * 1000.0;
        if timestamp_ms <= self.last_timestamp_ms {
            timestamp_ms = self.last_timestamp_ms + 1.0;
        }
        self.last_timestamp_ms = timestamp_ms;
        timestamp_ms
    }

    fn observe_face(&mut self, landmarks: LandmarkSet) {
        let detection_confidence = estimate_detection_confidence(&landmarks);
        let validation = is_valid_frame(&landmarks, detection_confidence, &self.config);

        // live feedback is refreshed for every detected face
        self.is_frontal = validation.is_frontal;
        self.is_centered = is_face_centered(&landmarks, DEFAULT_CENTER_TOLERANCE);

        if !validation.valid {
            debug!(reason = ?validation.reason, "frame rejected");
            return;
        }

        self.samples.push(landmarks);
        let ratio = self.samples.len() as f32 / self.config.target_samples as f32;
        self.progress = (ratio * 100.0).round().min(100.0) as u8;
        debug!(samples = self.samples.len(), progress = self.progress, "sample accepted");
    }

    fn finalize(&mut self, reason: FinishReason) {
        self.started_at = None;
        let collected = self.samples.len();
        let required = self.config.min_valid_samples;

        if collected < required {
            warn!(?reason, collected, required, "not enough valid samples");
            self.status = CaptureStatus::Error;
            self.error = Some(CaptureError::InsufficientSamples { collected, required });
            return;
        }

        self.status = CaptureStatus::Processing;
        let result = analyze_samples(&self.samples);
        info!(
            ?reason,
            dp_mm = result.dp.value,
            dp_confidence = result.dp.confidence,
            face_shape = %result.face_shape.classification,
            valid_samples = collected,
            "face analysis completed"
        );
        self.result = Some(result);
        self.status = CaptureStatus::Success;
    }
}

impl<D: LandmarkDetector> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// analyze_samples stabilizes the samples and derives DP and face shape.
///
/// # Arguments
/// * `samples` - accepted landmark sets
///
/// # Returns
/// * `FaceAnalysisResult`
pub fn analyze_samples(samples: &[LandmarkSet]) -> FaceAnalysisResult {
    let stabilized = process_landmarks_samples(samples, |values| {
        median_with_iqr(values, DEFAULT_IQR_MULTIPLIER)
    });

    let dp = calculate_dp(&stabilized);
    let face_shape = classify_face_shape(&stabilized);

    FaceAnalysisResult {
        dp: DpMeasurement {
            value: dp.value,
            confidence: dp.confidence,
            valid_samples: samples.len(),
        },
        face_shape,
        captured_at: Utc::now(),
    }
}
