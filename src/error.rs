use thiserror::Error;

use crate::pipeline::pipeline::CaptureStatus;

/// Session level failures. These are stored on the capture session and read
/// back through its status; they are never raised out of the frame loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("failed to load face detection model ({0}); reload the session")]
    ModelLoad(String),

    #[error(
        "insufficient samples ({collected}/{required}); improve the lighting and keep the face centered"
    )]
    InsufficientSamples { collected: usize, required: usize },

    #[error("capture cancelled")]
    Cancelled,

    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: CaptureStatus,
    },

    #[error("face detector is not loaded")]
    DetectorUnavailable,
}

impl CaptureError {
    /// Only a model load failure requires rebuilding the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::ModelLoad(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Failures of single frame measurement and manual entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("face not detected; center the face and try again")]
    FaceNotDetected,

    #[error("could not locate the eyes; try again")]
    EyesNotDetected,

    #[error("face detector failed: {0}")]
    Detector(String),

    #[error("pupillary distance must be a number")]
    InvalidManualValue,

    #[error("pupillary distance must be between {min} and {max} mm, got {value}")]
    ManualOutOfRange { value: f32, min: f32, max: f32 },
}
