pub mod config;
pub mod error;
pub mod helper;
pub mod modules;
pub mod pipeline;
pub mod utils;

pub use config::config::CaptureConfig;
pub use error::{CaptureError, ConfigError, MeasureError};
pub use modules::detector::{FrameSource, LandmarkDetector};
pub use pipeline::pipeline::{CaptureSession, CaptureSnapshot, CaptureStatus, FaceAnalysisResult};
pub use pipeline::runner::CaptureRunner;
pub use modules::measurement::{MeasurementHistory, MeasurementRecord};
pub use utils::coordinate::{LandmarkSet, NormalizedLandmark};
