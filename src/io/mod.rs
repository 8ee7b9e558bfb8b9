//! Input side of the pipeline: decompression, line splitting and input
//! expansion.

pub mod compression;
pub mod glob;
pub mod lines;
