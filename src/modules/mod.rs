pub mod detector;
pub mod measurement;
pub mod pupil_meter;
