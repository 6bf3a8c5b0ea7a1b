//! Detector output contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A face
    Face,
    /// A person; coarse region that may contain a face
    Person,
    /// A vehicle or other object (license plates included)
    #[serde(alias = "object", alias = "plate")]
    Vehicle,
    /// Recognized text
    Text,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Face => "face",
            Category::Person => "person",
            Category::Vehicle => "vehicle",
            Category::Text => "text",
        }
    }

    /// Categories whose region is searched for a finer face before blurring.
    pub fn wants_face_refinement(&self) -> bool {
        matches!(self, Category::Face | Category::Person)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Translate a box expressed relative to `self` into the parent's space.
    pub fn offset_from(&self, inner: &BoundingBox) -> BoundingBox {
        BoundingBox::new(self.x + inner.x, self.y + inner.y, inner.width, inner.height)
    }

    /// Intersect with the frame rectangle `[0, w) x [0, h)`.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let x1 = self.x.clamp(0.0, frame_width as f64);
        let y1 = self.y.clamp(0.0, frame_height as f64);
        let x2 = self.x2().clamp(0.0, frame_width as f64);
        let y2 = self.y2().clamp(0.0, frame_height as f64);
        BoundingBox::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0))
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// One recognized region in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Region category
    #[serde(alias = "type")]
    pub category: Category,
    /// Region in pixel space, `[x, y, w, h]` on the wire
    pub bbox: BoundingBox,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Recognized text (OCR results)
    #[serde(default, alias = "content", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Precise segmentation outline in pixel space, when the detector has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<(f64, f64)>>,
}

impl Detection {
    pub fn new(category: Category, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            category,
            bbox,
            confidence,
            text: None,
            polygon: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_polygon(mut self, polygon: Vec<(f64, f64)>) -> Self {
        self.polygon = Some(polygon);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_wire_format() {
        let json = r#"{"type":"object","bbox":[10,20,30,40],"confidence":0.82}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.category, Category::Vehicle);
        assert_eq!(det.bbox, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
        assert!(det.text.is_none());

        let json = r#"{"category":"text","bbox":[0,0,5,5],"confidence":0.9,"content":"12가3456"}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.category, Category::Text);
        assert_eq!(det.text.as_deref(), Some("12가3456"));
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = BoundingBox::new(-10.0, 90.0, 50.0, 50.0).clamp_to(100, 100);
        assert_eq!(b, BoundingBox::new(0.0, 90.0, 40.0, 10.0));
        assert!(BoundingBox::new(200.0, 0.0, 5.0, 5.0).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn test_face_refinement_categories() {
        assert!(Category::Face.wants_face_refinement());
        assert!(Category::Person.wants_face_refinement());
        assert!(!Category::Vehicle.wants_face_refinement());
        assert!(!Category::Text.wants_face_refinement());
    }
}
