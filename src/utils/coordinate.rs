use serde::{Deserialize, Serialize};

/// Number of points produced by the face landmark detector for one face.
pub const LANDMARK_COUNT: usize = 478;

/// A single detector point. `x` and `y` are relative to the image size,
/// `z` is a relative depth.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        NormalizedLandmark { x, y, z }
    }

    /// has_nan reports a point the detector failed to place.
    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

/// Ordered landmarks of one detected face, indexed by position.
pub type LandmarkSet = Vec<NormalizedLandmark>;

/// Fixed semantic positions inside a [`LandmarkSet`].
pub struct Landmarks;

impl Landmarks {
    pub const LEFT_IRIS_CENTER: usize = 468;
    pub const RIGHT_IRIS_CENTER: usize = 473;
    pub const LEFT_IRIS_LEFT: usize = 469;
    pub const LEFT_IRIS_RIGHT: usize = 471;
    pub const RIGHT_IRIS_LEFT: usize = 474;
    pub const RIGHT_IRIS_RIGHT: usize = 476;

    pub const IRIS: [usize; 6] = [
        Self::LEFT_IRIS_CENTER,
        Self::RIGHT_IRIS_CENTER,
        Self::LEFT_IRIS_LEFT,
        Self::LEFT_IRIS_RIGHT,
        Self::RIGHT_IRIS_LEFT,
        Self::RIGHT_IRIS_RIGHT,
    ];

    /// Face contour, clockwise from the top of the forehead.
    pub const FACE_OVAL: [usize; 36] = [
        10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377,
        152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
    ];

    pub const FOREHEAD_TOP: usize = 10;
    pub const FOREHEAD_LEFT: usize = 338;
    pub const FOREHEAD_RIGHT: usize = 109;

    pub const CHIN: usize = 152;

    pub const CHEEKBONE_LEFT: usize = 234;
    pub const CHEEKBONE_RIGHT: usize = 454;

    pub const JAW_LEFT: usize = 172;
    pub const JAW_RIGHT: usize = 397;
    pub const JAW_ANGLE_LEFT: usize = 136;
    pub const JAW_ANGLE_RIGHT: usize = 365;

    pub const FACE_LEFT: usize = 234;
    pub const FACE_RIGHT: usize = 454;
}
