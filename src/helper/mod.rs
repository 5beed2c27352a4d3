pub mod face_helper;
pub mod face_shape;
