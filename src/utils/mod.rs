pub mod coordinate;
pub mod statistics;
