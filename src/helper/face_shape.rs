use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::coordinate::{Landmarks, NormalizedLandmark, LANDMARK_COUNT};
use crate::utils::statistics::distance_2d;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Oval,
    Round,
    Square,
    Heart,
    Oblong,
}

impl FaceShape {
    pub const ALL: [FaceShape; 5] = [
        FaceShape::Oval,
        FaceShape::Round,
        FaceShape::Square,
        FaceShape::Heart,
        FaceShape::Oblong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaceShape::Oval => "oval",
            FaceShape::Round => "round",
            FaceShape::Square => "square",
            FaceShape::Heart => "heart",
            FaceShape::Oblong => "oblong",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FaceShape::Oval => "Oval",
            FaceShape::Round => "Round",
            FaceShape::Square => "Square",
            FaceShape::Heart => "Heart",
            FaceShape::Oblong => "Oblong",
        }
    }

    /// Frame advice shown next to the classification.
    pub fn description(&self) -> &'static str {
        match self {
            FaceShape::Oval => {
                "Balanced proportions with a forehead slightly wider than the jaw. The most versatile shape for frames."
            }
            FaceShape::Round => {
                "Similar width and height with full cheeks. Angular frames can add definition."
            }
            FaceShape::Square => {
                "Forehead, cheekbones and jaw of similar width with angular lines. Rounded frames can soften them."
            }
            FaceShape::Heart => {
                "Wide forehead with a narrower jaw and delicate chin. Frames that balance the lower face work well."
            }
            FaceShape::Oblong => {
                "Elongated face with a pronounced vertical proportion. Wider frames help balance it."
            }
        }
    }
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distances in normalized image units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMeasurements {
    pub face_width: f32,
    pub face_height: f32,
    pub forehead_width: f32,
    pub jaw_width: f32,
    pub cheekbone_width: f32,
    /// height / width
    pub aspect_ratio: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceShapeResult {
    pub classification: FaceShape,
    pub confidence: u8,
    pub measurements: FaceMeasurements,
}

/// calculate_face_measurements extracts the face proportions. Incomplete sets
/// yield an all zero record.
pub fn calculate_face_measurements(landmarks: &[NormalizedLandmark]) -> FaceMeasurements {
    if landmarks.len() < LANDMARK_COUNT {
        return FaceMeasurements::default();
    }

    let at = |idx: usize| &landmarks[idx];

    let face_height = distance_2d(at(Landmarks::FOREHEAD_TOP), at(Landmarks::CHIN));
    let face_width = distance_2d(at(Landmarks::CHEEKBONE_LEFT), at(Landmarks::CHEEKBONE_RIGHT));
    let forehead_width = distance_2d(at(Landmarks::FOREHEAD_LEFT), at(Landmarks::FOREHEAD_RIGHT));
    let jaw_width = distance_2d(at(Landmarks::JAW_ANGLE_LEFT), at(Landmarks::JAW_ANGLE_RIGHT));

    let aspect_ratio = if face_width > 0.0 { face_height / face_width } else { 0.0 };

    FaceMeasurements {
        face_width,
        face_height,
        forehead_width,
        jaw_width,
        // the widest line of the face runs through the cheekbones
        cheekbone_width: face_width,
        aspect_ratio,
    }
}

/// classify_face_shape applies an ordered rule ladder to the face
/// proportions; the first matching rule wins.
///
/// 1. aspect > 1.5 -> oblong (85)
/// 2. aspect < 1.1 and forehead ~ jaw within 10% -> round (85)
/// 3. aspect < 1.25, forehead ~ jaw and cheekbone ~ jaw within 15% -> square (80)
/// 4. forehead / jaw > 1.2 -> heart (85)
/// 5. otherwise oval (90)
///
/// Thresholds are hand tuned. Reordering the rules changes results near the
/// boundaries.
///
/// # Arguments
/// * `landmarks` - a stabilized landmark set
///
/// # Returns
/// * `FaceShapeResult`, oval with confidence 0 when the face has no extent
pub fn classify_face_shape(landmarks: &[NormalizedLandmark]) -> FaceShapeResult {
    let measurements = calculate_face_measurements(landmarks);

    if measurements.face_width == 0.0 || measurements.face_height == 0.0 {
        return FaceShapeResult {
            classification: FaceShape::Oval,
            confidence: 0,
            measurements,
        };
    }

    let FaceMeasurements { aspect_ratio, forehead_width, jaw_width, cheekbone_width, .. } = measurements;

    let (forehead_to_jaw, cheek_to_jaw) = if jaw_width > 0.0 {
        (forehead_width / jaw_width, cheekbone_width / jaw_width)
    } else {
        (1.0, 1.0)
    };

    let (classification, confidence) = if aspect_ratio > 1.5 {
        (FaceShape::Oblong, 85)
    } else if aspect_ratio < 1.1 && (forehead_to_jaw - 1.0).abs() < 0.1 {
        (FaceShape::Round, 85)
    } else if aspect_ratio < 1.25
        && (forehead_to_jaw - 1.0).abs() < 0.15
        && (cheek_to_jaw - 1.0).abs() < 0.15
    {
        (FaceShape::Square, 80)
    } else if forehead_to_jaw > 1.2 {
        (FaceShape::Heart, 85)
    } else {
        (FaceShape::Oval, 90)
    };

    FaceShapeResult { classification, confidence, measurements }
}


#[cfg(test)]
mod tests {
    use crate::helper::face_helper::fixtures::frontal_face;
    use crate::helper::face_shape::fixtures::face_outline;
    use crate::helper::face_shape::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_face_measurements() {
        let m = calculate_face_measurements(&face_outline(0.4, 0.5, 0.36, 0.3));
        assert!(approx(m.face_width, 0.4));
        assert!(approx(m.face_height, 0.5));
        assert!(approx(m.forehead_width, 0.36));
        assert!(approx(m.jaw_width, 0.3));
        assert_eq!(m.cheekbone_width, m.face_width);
        assert!(approx(m.aspect_ratio, 1.25));
    }

    #[test]
    fn test_face_measurements_short_set() {
        assert_eq!(calculate_face_measurements(&frontal_face()[..10]), FaceMeasurements::default());
    }

    #[test]
    fn test_flat_face_is_unclassified() {
        // every outline point collapses on the frame center
        let result = classify_face_shape(&frontal_face());
        assert_eq!(result.classification, FaceShape::Oval);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn test_oblong() {
        let result = classify_face_shape(&face_outline(0.4, 0.65, 0.36, 0.34));
        assert_eq!(result.classification, FaceShape::Oblong);
        assert_eq!(result.confidence, 85);
    }

    #[test]
    fn test_round_wins_over_square() {
        // aspect 1.05, forehead/jaw and cheek/jaw 1.053: both rules match
        let landmarks = face_outline(0.4, 0.42, 0.4, 0.38);
        let m = calculate_face_measurements(&landmarks);
        assert!(m.aspect_ratio < 1.1);
        assert!((m.cheekbone_width / m.jaw_width - 1.0).abs() < 0.15);

        let result = classify_face_shape(&landmarks);
        assert_eq!(result.classification, FaceShape::Round);
        assert_eq!(result.confidence, 85);
    }

    #[test]
    fn test_square() {
        let result = classify_face_shape(&face_outline(0.4, 0.48, 0.4, 0.38));
        assert_eq!(result.classification, FaceShape::Square);
        assert_eq!(result.confidence, 80);
    }

    #[test]
    fn test_heart() {
        let result = classify_face_shape(&face_outline(0.4, 0.52, 0.4, 0.3));
        assert_eq!(result.classification, FaceShape::Heart);
        assert_eq!(result.confidence, 85);
    }

    #[test]
    fn test_oval_default() {
        let result = classify_face_shape(&face_outline(0.4, 0.54, 0.36, 0.32));
        assert_eq!(result.classification, FaceShape::Oval);
        assert_eq!(result.confidence, 90);
    }

    #[test]
    fn test_face_shape_serialization() {
        assert_eq!(serde_json::to_string(&FaceShape::Heart).unwrap(), "\"heart\"");
        assert_eq!(FaceShape::Square.to_string(), "square");
        assert!(FaceShape::ALL.iter().all(|shape| !shape.description().is_empty()));
    }
}
