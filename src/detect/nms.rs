//! Class-aware non-maximum suppression.

use serde::Deserialize;

use crate::detect::result::Detection;
use crate::error::{PipelineError, PipelineResult};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// IoU above which a lower-confidence box of the same label is dropped.
    pub same_class_iou: f32,
    /// IoU above which a lower-confidence box of a different label is dropped.
    pub cross_class_iou: f32,
    /// Cap on detections considered per frame, applied after sorting.
    pub max_candidates: usize,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            same_class_iou: 0.3,
            cross_class_iou: 0.6,
            max_candidates: 300,
        }
    }
}

impl NmsConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.same_class_iou) || !in_unit(self.cross_class_iou) {
            return Err(PipelineError::configuration(format!(
                "NMS IoU thresholds must be within [0, 1]: {:?}",
                self
            )));
        }
        if self.max_candidates == 0 {
            return Err(PipelineError::configuration("NMS max_candidates must be > 0"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Suppressor {
    config: NmsConfig,
}

impl Suppressor {
    pub fn new(config: NmsConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Keep the highest-confidence detection of each overlapping group.
    ///
    /// Output is sorted by confidence descending; equal confidences keep their
    /// input order.
    pub fn suppress(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        detections.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        if detections.len() > self.config.max_candidates {
            log::warn!(
                "NMS input truncated from {} to {} detections",
                detections.len(),
                self.config.max_candidates
            );
            detections.truncate(self.config.max_candidates);
        }

        let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
        for candidate in detections {
            let overlapped = kept.iter().any(|k| {
                let threshold = if k.label() == candidate.label() {
                    self.config.same_class_iou
                } else {
                    self.config.cross_class_iou
                };
                k.bbox().iou(candidate.bbox()) > threshold
            });
            if !overlapped {
                kept.push(candidate);
            }
        }
        kept
    }
}
