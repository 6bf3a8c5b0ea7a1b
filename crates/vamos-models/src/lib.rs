//! Shared data models for the VAMOS redaction pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and processing stage
//! - Detections produced by the detector and consumed by the compositor
//! - Blur modes
//! - The line-oriented progress stream wire format

pub mod blur;
pub mod detection;
pub mod job;
pub mod progress;

// Re-export common types
pub use blur::{BlurMode, UnknownBlurMode};
pub use detection::{BoundingBox, Category, Detection};
pub use job::{JobId, JobOptions, JobSnapshot, JobStatus, Stage};
pub use progress::ProgressEvent;
