//! Bounding boxes and scored detections.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in pixel coordinates of the source frame.
///
/// Corners are stored as floats because detectors emit sub-pixel positions;
/// [`BoundingBox::to_pixel_rect`] clamps to a concrete pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner.
    pub x1: f32,
    /// Y coordinate of the top-left corner.
    pub y1: f32,
    /// X coordinate of the bottom-right corner.
    pub x2: f32,
    /// Y coordinate of the bottom-right corner.
    pub y2: f32,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width of the box (zero when degenerate).
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Height of the box (zero when degenerate).
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp to an integer pixel region inside a `width` x `height` frame.
    ///
    /// Returns `(x, y, w, h)`, or `None` when the box lies entirely outside
    /// the frame or collapses to an empty region.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        if self.x1 >= width as f32 || self.y1 >= height as f32 || self.x2 <= 0.0 || self.y2 <= 0.0 {
            return None;
        }
        let x1 = self.x1.max(0.0).min((width - 1) as f32) as u32;
        let y1 = self.y1.max(0.0).min((height - 1) as f32) as u32;
        let x2 = self.x2.max(0.0).min(width as f32) as u32;
        let y2 = self.y2.max(0.0).min(height as f32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// One labeled, scored object found by a detector in a single frame.
///
/// Produced fresh per frame; never persisted across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Lowercase class label (e.g. "player", "ball", "main referee").
    pub label: String,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    /// Bounding box in source-frame pixel coordinates.
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a new detection.
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Check if this detection is a field player.
    pub fn is_player(&self) -> bool {
        self.label == "player"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_dimensions() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 220.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 200.0);
        assert_eq!(b.area(), 20_000.0);
    }

    #[test]
    fn test_bbox_degenerate_has_zero_area() {
        let b = BoundingBox::new(50.0, 50.0, 40.0, 60.0);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_to_pixel_rect_clamps_to_frame() {
        let b = BoundingBox::new(-5.0, -5.0, 20.0, 15.0);
        assert_eq!(b.to_pixel_rect(10, 10), Some((0, 0, 10, 10)));
    }

    #[test]
    fn test_to_pixel_rect_outside_frame() {
        let b = BoundingBox::new(50.0, 50.0, 60.0, 60.0);
        assert_eq!(b.to_pixel_rect(10, 10), None);
    }

    #[test]
    fn test_is_player() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(Detection::new("player", 0.9, bbox).is_player());
        assert!(!Detection::new("ball", 0.9, bbox).is_player());
    }
}
