use serde::{Deserialize, Serialize};

use crate::config::config::CaptureConfig;
use crate::utils::coordinate::{Landmarks, NormalizedLandmark, LANDMARK_COUNT};
use crate::utils::statistics::distance_2d;

/// Mean human iris diameter used as the physical scale reference. Calibrated,
/// not measured per user.
pub const AVG_IRIS_DIAMETER_MM: f32 = 12.5;

/// Normal adult pupillary distance range in mm.
pub const DP_MIN_MM: f32 = 50.0;
pub const DP_MAX_MM: f32 = 80.0;

/// Iris depth difference from which the subject is not looking straight.
pub const DP_MAX_Z_DIFF: f32 = 0.03;
/// Smaller over larger iris diameter below which the iris detection is
/// considered asymmetric.
pub const DP_MIN_IRIS_RATIO: f32 = 0.85;

const PENALTY_NOT_STRAIGHT: i32 = 25;
const PENALTY_OUT_OF_RANGE: i32 = 15;
const PENALTY_IRIS_ASYMMETRY: i32 = 20;

pub const DEFAULT_CENTER_TOLERANCE: f32 = 0.2;

/// Confidence from which a camera reading may be saved.
pub const MIN_SAVEABLE_CONFIDENCE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowConfidence,
    InsufficientLandmarks,
    NotFrontal,
    InvalidIris,
}

/// Outcome of the per frame quality gate. `is_frontal` is reported even for
/// rejected frames so it can drive live feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameValidation {
    pub valid: bool,
    pub is_frontal: bool,
    pub reason: Option<RejectReason>,
}

impl FrameValidation {
    fn reject(is_frontal: bool, reason: RejectReason) -> Self {
        FrameValidation { valid: false, is_frontal, reason: Some(reason) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpResult {
    /// Pupillary distance in mm, rounded to 0.1 mm.
    pub value: f32,
    /// 0..=100
    pub confidence: u8,
}

impl DpResult {
    pub fn zero() -> Self {
        DpResult { value: 0.0, confidence: 0 }
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }

    pub fn is_saveable(&self) -> bool {
        self.confidence >= MIN_SAVEABLE_CONFIDENCE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            80..=u8::MAX => ConfidenceLevel::High,
            60..=79 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::Low,
        }
    }
}

fn has_full_set(landmarks: &[NormalizedLandmark]) -> bool {
    landmarks.len() >= LANDMARK_COUNT
}

/// is_valid_frame decides whether a detected face can be used as a sample.
///
/// Checks run in order: detection confidence, landmark count, frontal pose,
/// NaN-free iris coordinates. A frame rejected at the iris check still reports
/// `is_frontal = true`.
///
/// # Arguments
/// * `landmarks` - landmarks of the detected face
/// * `detection_confidence` - detector quality signal in 0..=1
/// * `config` - capture thresholds
///
/// # Returns
/// * `FrameValidation`
pub fn is_valid_frame(
    landmarks: &[NormalizedLandmark],
    detection_confidence: f32,
    config: &CaptureConfig,
) -> FrameValidation {
    if detection_confidence < config.min_detection_confidence {
        return FrameValidation::reject(false, RejectReason::LowConfidence);
    }

    if !has_full_set(landmarks) {
        return FrameValidation::reject(false, RejectReason::InsufficientLandmarks);
    }

    let left_iris = &landmarks[Landmarks::LEFT_IRIS_CENTER];
    let right_iris = &landmarks[Landmarks::RIGHT_IRIS_CENTER];
    let z_diff = (left_iris.z - right_iris.z).abs();

    // NaN depth fails this comparison as well
    if !(z_diff <= config.max_z_diff_for_frontal) {
        return FrameValidation::reject(false, RejectReason::NotFrontal);
    }

    if Landmarks::IRIS.iter().any(|&idx| landmarks[idx].has_nan()) {
        return FrameValidation::reject(true, RejectReason::InvalidIris);
    }

    FrameValidation { valid: true, is_frontal: true, reason: None }
}

/// is_face_centered checks that the midpoint of both iris centers lies within
/// `tolerance` of the frame center (0.5, 0.5).
pub fn is_face_centered(landmarks: &[NormalizedLandmark], tolerance: f32) -> bool {
    if !has_full_set(landmarks) {
        return false;
    }

    let left_iris = &landmarks[Landmarks::LEFT_IRIS_CENTER];
    let right_iris = &landmarks[Landmarks::RIGHT_IRIS_CENTER];
    let face_center = NormalizedLandmark::new(
        (left_iris.x + right_iris.x) / 2.0,
        (left_iris.y + right_iris.y) / 2.0,
        0.0,
    );
    let frame_center = NormalizedLandmark::new(0.5, 0.5, 0.0);

    distance_2d(&face_center, &frame_center) <= tolerance
}

/// calculate_dp estimates the pupillary distance in mm using the iris
/// diameter as scale reference.
///
/// Confidence starts at 100 and loses 25 when the eyes are at different
/// depths, 15 when the value is outside the adult range and 20 when both iris
/// diameters disagree. Penalties are additive and hand tuned.
///
/// # Arguments
/// * `landmarks` - a stabilized landmark set
///
/// # Returns
/// * `DpResult`, zero for incomplete sets or a degenerate iris
pub fn calculate_dp(landmarks: &[NormalizedLandmark]) -> DpResult {
    if !has_full_set(landmarks) {
        return DpResult::zero();
    }

    let left_iris_center = &landmarks[Landmarks::LEFT_IRIS_CENTER];
    let right_iris_center = &landmarks[Landmarks::RIGHT_IRIS_CENTER];

    let left_iris_diameter = distance_2d(
        &landmarks[Landmarks::LEFT_IRIS_LEFT],
        &landmarks[Landmarks::LEFT_IRIS_RIGHT],
    );
    let right_iris_diameter = distance_2d(
        &landmarks[Landmarks::RIGHT_IRIS_LEFT],
        &landmarks[Landmarks::RIGHT_IRIS_RIGHT],
    );
    let avg_iris_diameter = (left_iris_diameter + right_iris_diameter) / 2.0;
    if avg_iris_diameter == 0.0 || !avg_iris_diameter.is_finite() {
        return DpResult::zero();
    }

    let pupil_distance = distance_2d(left_iris_center, right_iris_center);
    let dp_mm = pupil_distance / avg_iris_diameter * AVG_IRIS_DIAMETER_MM;

    let mut confidence: i32 = 100;

    let z_diff = (left_iris_center.z - right_iris_center.z).abs();
    if z_diff >= DP_MAX_Z_DIFF {
        confidence -= PENALTY_NOT_STRAIGHT;
    }

    if !(DP_MIN_MM..=DP_MAX_MM).contains(&dp_mm) {
        confidence -= PENALTY_OUT_OF_RANGE;
    }

    let iris_ratio = left_iris_diameter.min(right_iris_diameter)
        / left_iris_diameter.max(right_iris_diameter);
    if iris_ratio < DP_MIN_IRIS_RATIO {
        confidence -= PENALTY_IRIS_ASYMMETRY;
    }

    DpResult {
        value: (dp_mm * 10.0).round() / 10.0,
        confidence: confidence.max(0) as u8,
    }
}
