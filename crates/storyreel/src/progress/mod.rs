//! Generation progress tracking.

pub mod tracker;

pub use tracker::{ProgressRecord, ProgressStatus, ProgressTracker, ProgressUpdate};
