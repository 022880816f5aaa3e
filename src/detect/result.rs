use serde::Serialize;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// Axis-aligned box in original-frame pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// Intersection-over-union; 0 when either box is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let inter_h = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let intersection = inter_w * inter_h;
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union > f32::EPSILON {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One validated object in a frame. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    label: Arc<str>,
    class_index: usize,
    confidence: f32,
    bbox: BoundingBox,
    frame_width: u32,
    frame_height: u32,
}

impl Detection {
    /// Build a detection, enforcing frame bounds and a non-degenerate box.
    pub fn new(
        label: impl Into<Arc<str>>,
        class_index: usize,
        confidence: f32,
        bbox: BoundingBox,
        frame_width: u32,
        frame_height: u32,
    ) -> PipelineResult<Self> {
        if frame_width == 0 || frame_height == 0 {
            return Err(PipelineError::invalid_input("detection frame is empty"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::invalid_input(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let in_bounds = bbox.left >= 0.0
            && bbox.top >= 0.0
            && bbox.right <= fw
            && bbox.bottom <= fh
            && bbox.left < bbox.right
            && bbox.top < bbox.bottom;
        if !in_bounds {
            return Err(PipelineError::invalid_input(format!(
                "box {:?} is degenerate or outside {}x{}",
                bbox, frame_width, frame_height
            )));
        }
        Ok(Self {
            label: label.into(),
            class_index,
            confidence,
            bbox,
            frame_width,
            frame_height,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn label_arc(&self) -> &Arc<str> {
        &self.label
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn center_x(&self) -> f32 {
        self.bbox.center_x()
    }

    pub fn center_y(&self) -> f32 {
        self.bbox.center_y()
    }

    /// Box area over frame area, in `[0, 1]`. Used as a proxy for proximity.
    pub fn relative_size(&self) -> f32 {
        let frame_area = self.frame_width as f32 * self.frame_height as f32;
        (self.bbox.area() / frame_area).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn derived_geometry() {
        let det = Detection::new(
            "chair",
            56,
            0.7,
            BoundingBox::new(0.0, 0.0, 50.0, 100.0),
            100,
            100,
        )
        .unwrap();
        assert_eq!(det.center_x(), 25.0);
        assert_eq!(det.center_y(), 50.0);
        assert!((det.relative_size() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_frame_boxes() {
        let res = Detection::new(
            "car",
            2,
            0.9,
            BoundingBox::new(-1.0, 0.0, 10.0, 10.0),
            100,
            100,
        );
        assert!(matches!(res, Err(PipelineError::InvalidInput(_))));

        let res = Detection::new("car", 2, 1.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 10, 10);
        assert!(res.is_err());
    }
}
