pub mod aggregation;
pub mod pipeline;
pub mod runner;
