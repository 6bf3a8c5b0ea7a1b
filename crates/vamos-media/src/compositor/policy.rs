//! Category-specific redaction rules.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use vamos_models::{BlurMode, BoundingBox, Category, Detection};

use super::blur::blend_blur_into;
use super::mask::{expand_box, mask_from_region, RegionShape};

/// How a detection is turned into a blurred region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Blur transform
    pub blur_mode: BlurMode,
    /// Feather width in pixels (0 = hard edge)
    pub feather_px: i32,
    /// Padding ratio around face regions
    pub face_pad: f64,
    /// Padding ratio around text and other rectangular regions
    pub default_pad: f64,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            blur_mode: BlurMode::Gaussian,
            feather_px: 0,
            face_pad: 0.18,
            default_pad: 0.05,
        }
    }
}

impl RedactionPolicy {
    pub fn new(blur_mode: BlurMode, feather_px: i32) -> Self {
        Self {
            blur_mode,
            feather_px,
            ..Self::default()
        }
    }

    /// Regions (shape and box) a detection redacts.
    ///
    /// `refined_faces` are finer face boxes found inside a face or person
    /// region, in frame coordinates. When present they replace the coarse
    /// region.
    pub fn regions(
        &self,
        detection: &Detection,
        refined_faces: &[BoundingBox],
        width: u32,
        height: u32,
    ) -> Vec<(RegionShape, BoundingBox)> {
        match detection.category {
            Category::Face | Category::Person if !refined_faces.is_empty() => refined_faces
                .iter()
                .map(|face| (RegionShape::Ellipse, expand_box(face, self.face_pad, width, height)))
                .collect(),
            Category::Face => vec![(
                RegionShape::Ellipse,
                expand_box(&detection.bbox, self.face_pad, width, height),
            )],
            Category::Vehicle => match &detection.polygon {
                Some(points) if points.len() >= 3 => vec![(
                    RegionShape::Polygon(points.clone()),
                    detection.bbox.clamp_to(width, height),
                )],
                _ => vec![(RegionShape::Rectangle, detection.bbox.clamp_to(width, height))],
            },
            Category::Person | Category::Text => vec![(
                RegionShape::Rectangle,
                expand_box(&detection.bbox, self.default_pad, width, height),
            )],
        }
    }

    /// Redact one detection in place. Returns the number of regions blurred.
    pub fn apply(
        &self,
        frame: &mut RgbImage,
        detection: &Detection,
        refined_faces: &[BoundingBox],
    ) -> usize {
        let (width, height) = frame.dimensions();
        let mut applied = 0;

        for (shape, region) in self.regions(detection, refined_faces, width, height) {
            if region.is_empty() {
                continue;
            }
            let mask = mask_from_region(&shape, &region, width, height);
            blend_blur_into(frame, &mask, self.blur_mode, self.feather_px, Some(&region));
            applied += 1;
        }

        applied
    }
}
