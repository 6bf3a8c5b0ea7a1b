//! The detector seam.

use image::RgbImage;
use vamos_models::{BoundingBox, Detection};

use crate::error::DetectResult;

/// Finds sensitive regions in a frame.
///
/// Calls are synchronous and made from blocking worker threads, once per
/// frame. Implementations must be shareable across those threads.
pub trait Detector: Send + Sync {
    /// Detect all regions in `frame`, in frame pixel coordinates.
    fn detect(&self, frame: &RgbImage) -> DetectResult<Vec<Detection>>;

    /// Look for faces inside a cropped region. Boxes are relative to `region`.
    ///
    /// Detectors without a dedicated face model find none, which makes the
    /// compositor fall back to the coarse region.
    fn refine_faces(&self, region: &RgbImage) -> DetectResult<Vec<BoundingBox>> {
        let _ = region;
        Ok(Vec::new())
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Detector that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDetector;

impl Detector for PassthroughDetector {
    fn detect(&self, _frame: &RgbImage) -> DetectResult<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
