use anyhow::Error;

use crate::utils::coordinate::{LandmarkSet, NormalizedLandmark, LANDMARK_COUNT};

/// Detection confidence assumed for a face with a complete landmark set.
pub const FULL_SET_CONFIDENCE: f32 = 0.95;
/// Detection confidence assumed for a face with missing landmarks.
pub const PARTIAL_SET_CONFIDENCE: f32 = 0.70;

/// External face landmark model. Given a frame, it returns zero or more
/// faces; callers use only the first one.
pub trait LandmarkDetector {
    type Frame;

    /// detect runs the model on one frame.
    ///
    /// # Arguments
    /// * `frame` - the current video frame
    /// * `timestamp_ms` - monotonically increasing logical timestamp
    ///
    /// # Returns
    /// * `Result<Vec<LandmarkSet>, Error>`
    fn detect(&mut self, frame: &Self::Frame, timestamp_ms: f64) -> Result<Vec<LandmarkSet>, Error>;

    /// close releases the model. Called once on teardown.
    fn close(&mut self) {}
}

/// Supplier of video frames, polled once per scheduled iteration.
pub trait FrameSource {
    type Frame;

    /// next_frame returns `None` when no frame is available yet.
    fn next_frame(&mut self) -> Option<Self::Frame>;
}

/// The detector reports no confidence of its own. A complete landmark set is
/// used as a coarse proxy.
pub fn estimate_detection_confidence(landmarks: &[NormalizedLandmark]) -> f32 {
    if landmarks.len() >= LANDMARK_COUNT {
        FULL_SET_CONFIDENCE
    } else {
        PARTIAL_SET_CONFIDENCE
    }
}

/// first_face picks the face the pipeline works with.
pub fn first_face(mut faces: Vec<LandmarkSet>) -> Option<LandmarkSet> {
    if faces.is_empty() {
        return None;
    }
    Some(faces.swap_remove(0))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Error;

    use crate::modules::detector::{FrameSource, LandmarkDetector};
    use crate::utils::coordinate::LandmarkSet;

    /// What the scripted detector answers for one call.
    #[derive(Debug, Clone)]
    pub enum Detection {
        Face(LandmarkSet),
        NoFace,
        Fail(&'static str),
    }

    /// Replays a fixed script of detections. Once the script runs out it
    /// repeats `fallback`.
    #[derive(Debug)]
    pub struct ScriptedDetector {
        script: VecDeque<Detection>,
        fallback: Detection,
        pub calls: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl ScriptedDetector {
        pub fn new(script: Vec<Detection>, fallback: Detection) -> Self {
            ScriptedDetector {
                script: script.into(),
                fallback,
                calls: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl LandmarkDetector for ScriptedDetector {
        type Frame = u32;

        fn detect(&mut self, _frame: &u32, _timestamp_ms: f64) -> Result<Vec<LandmarkSet>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.pop_front().unwrap_or_else(|| self.fallback.clone());
            match next {
                Detection::Face(landmarks) => Ok(vec![landmarks]),
                Detection::NoFace => Ok(vec![]),
                Detection::Fail(msg) => Err(Error::msg(msg)),
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Endless counter of frame numbers.
    #[derive(Debug, Default)]
    pub struct CountingSource {
        next: u32,
    }

    impl FrameSource for CountingSource {
        type Frame = u32;

        fn next_frame(&mut self) -> Option<u32> {
            self.next += 1;
            Some(self.next)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::helper::face_helper::fixtures::frontal_face;
    use crate::modules::detector::*;

    #[test]
    fn test_detection_confidence_proxy() {
        let face = frontal_face();
        assert_eq!(estimate_detection_confidence(&face), FULL_SET_CONFIDENCE);
        assert_eq!(estimate_detection_confidence(&face[..400]), PARTIAL_SET_CONFIDENCE);
    }

    #[test]
    fn test_first_face() {
        assert!(first_face(vec![]).is_none());
        let short = frontal_face()[..5].to_vec();
        let picked = first_face(vec![short.clone(), frontal_face()]).unwrap();
        assert_eq!(picked, short);
    }
}
