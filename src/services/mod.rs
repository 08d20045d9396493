pub mod dashboard;
pub mod dataset;
pub mod exporter;
pub mod profiler;
pub mod summary;
