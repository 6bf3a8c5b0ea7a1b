//! Detector contract and implementations.
//!
//! The pipeline treats detection as an external collaborator: a frame goes
//! in, categorized regions come out. This crate defines that seam and ships
//! two implementations:
//! - [`ServiceDetector`]: HTTP client for an inference service
//! - [`PassthroughDetector`]: detects nothing, leaving frames untouched

pub mod client;
pub mod detector;
pub mod error;
pub mod types;

pub use client::{DetectorConfig, ServiceDetector};
pub use detector::{Detector, PassthroughDetector};
pub use error::{DetectError, DetectResult};
pub use types::{DetectResponse, FacesResponse};
