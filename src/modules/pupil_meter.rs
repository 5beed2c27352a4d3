use std::time::Instant;

use tracing::{debug, warn};

use crate::error::MeasureError;
use crate::helper::face_helper::{calculate_dp, DpResult};
use crate::modules::detector::{first_face, LandmarkDetector};

/// PupilMeter takes a DP reading from a single frame, without sampling or
/// aggregation. It is the quick path of the measurement screen.
pub struct PupilMeter<D: LandmarkDetector> {
    detector: Option<D>,
    last_reading: Option<DpResult>,
    epoch: Instant,
    last_timestamp_ms: f64,
}

impl<D: LandmarkDetector> PupilMeter<D> {
    pub fn new(detector: D) -> Self {
        PupilMeter {
            detector: Some(detector),
            last_reading: None,
            epoch: Instant::now(),
            last_timestamp_ms: 0.0,
        }
    }

    /// measure runs one detection and computes the DP of the first face.
    ///
    /// # Arguments
    /// * `frame` - the frame to measure
    ///
    /// # Returns
    /// * `Result<DpResult, MeasureError>`
    pub fn measure(&mut self, frame: &D::Frame) -> Result<DpResult, MeasureError> {
        let timestamp_ms = self.next_timestamp_ms();
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| MeasureError::Detector("detector closed".to_string()))?;

        let faces = detector.detect(frame, timestamp_ms).map_err(|e| {
            warn!(error = %e, "pupil measurement detection failed");
            MeasureError::Detector(e.to_string())
        })?;

        let landmarks = first_face(faces).ok_or(MeasureError::FaceNotDetected)?;
        let dp = calculate_dp(&landmarks);
        if dp.value == 0.0 {
            return Err(MeasureError::EyesNotDetected);
        }

        debug!(dp_mm = dp.value, confidence = dp.confidence, "pupil measurement taken");
        self.last_reading = Some(dp);
        Ok(dp)
    }

    pub fn last_reading(&self) -> Option<DpResult> {
        self.last_reading
    }

    pub fn reset(&mut self) {
        self.last_reading = None;
    }

    /// close releases the detector. Later measurements fail.
    pub fn close(&mut self) {
        if let Some(mut detector) = self.detector.take() {
            detector.close();
        }
    }

    fn next_timestamp_ms(&mut self) -> f64 {
        let mut timestamp_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;
        if timestamp_ms <= self.last_timestamp_ms {
            timestamp_ms = self.last_timestamp_ms + 1.0;
        }
        self.last_timestamp_ms = timestamp_ms;
        timestamp_ms
    }
}

impl<D: LandmarkDetector> Drop for PupilMeter<D> {
    fn drop(&mut self) {
        self.close();
    }
}
