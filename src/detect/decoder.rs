//! Raw tensor to validated detections.

use serde::Deserialize;
use std::sync::Arc;

use crate::category::CategoryTable;
use crate::detect::result::{BoundingBox, Detection};
use crate::detect::tensor::{BoxUnits, RawOutput, BOX_ATTRIBUTES};
use crate::error::{PipelineError, PipelineResult};
use crate::preprocess::LetterboxTransform;

/// Geometry bounds applied to each candidate before any class work.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub center_min: f32,
    pub center_max: f32,
    pub extent_min: f32,
    pub extent_max: f32,
    /// Minimum box edge after mapping to the original frame.
    pub min_box_px: f32,
    /// Maximum box edge as a fraction of the matching frame dimension.
    pub max_box_fraction: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            center_min: 0.05,
            center_max: 0.95,
            extent_min: 0.02,
            extent_max: 0.90,
            min_box_px: 12.0,
            max_box_fraction: 0.8,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        let ok = (0.0..=1.0).contains(&self.center_min)
            && self.center_min < self.center_max
            && self.center_max <= 1.0
            && self.extent_min >= 0.0
            && self.extent_min < self.extent_max
            && self.extent_max <= 1.0
            && self.min_box_px >= 0.0
            && self.max_box_fraction > 0.0
            && self.max_box_fraction <= 1.0;
        if ok {
            Ok(())
        } else {
            Err(PipelineError::configuration(format!(
                "inconsistent decoder bounds: {:?}",
                self
            )))
        }
    }
}

/// Per-frame rejection counters, logged at debug level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub candidates: usize,
    pub rejected_geometry: usize,
    pub rejected_ambiguous: usize,
    pub rejected_confidence: usize,
    pub rejected_size: usize,
    pub accepted: usize,
}

pub struct Decoder {
    config: DecoderConfig,
    table: Arc<CategoryTable>,
}

impl Decoder {
    pub fn new(config: DecoderConfig, table: Arc<CategoryTable>) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config, table })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode(
        &self,
        output: &RawOutput,
        transform: &LetterboxTransform,
    ) -> PipelineResult<(Vec<Detection>, DecodeStats)> {
        let num_classes = self.table.len();
        if output.attributes() != BOX_ATTRIBUTES + num_classes {
            return Err(PipelineError::invalid_input(format!(
                "output has {} attributes per candidate, expected {} for {} labels",
                output.attributes(),
                BOX_ATTRIBUTES + num_classes,
                num_classes
            )));
        }
        if transform.frame_width == 0 || transform.frame_height == 0 {
            return Err(PipelineError::invalid_input("transform has an empty frame"));
        }

        let (unit_x, unit_y) = match output.units() {
            BoxUnits::Normalized => (1.0, 1.0),
            BoxUnits::InputPixels => (
                transform.input_width as f32,
                transform.input_height as f32,
            ),
        };

        let cfg = &self.config;
        let frame_w = transform.frame_width as f32;
        let frame_h = transform.frame_height as f32;
        let mut stats = DecodeStats {
            candidates: output.candidates(),
            ..Default::default()
        };
        let mut detections = Vec::new();

        for i in 0..output.candidates() {
            let cx = output.value(i, 0) / unit_x;
            let cy = output.value(i, 1) / unit_y;
            let w = output.value(i, 2) / unit_x;
            let h = output.value(i, 3) / unit_y;

            let centers_ok = (cfg.center_min..=cfg.center_max).contains(&cx)
                && (cfg.center_min..=cfg.center_max).contains(&cy);
            let extents_ok = (cfg.extent_min..=cfg.extent_max).contains(&w)
                && (cfg.extent_min..=cfg.extent_max).contains(&h);
            // NaN fails every range check above.
            if !centers_ok || !extents_ok {
                stats.rejected_geometry += 1;
                continue;
            }

            let (mut best_idx, mut best, mut second) = (0usize, f32::NEG_INFINITY, f32::NEG_INFINITY);
            for class in 0..num_classes {
                let score = output.value(i, BOX_ATTRIBUTES + class);
                if score > best {
                    second = best;
                    best = score;
                    best_idx = class;
                } else if score > second {
                    second = score;
                }
            }
            if !best.is_finite() {
                stats.rejected_geometry += 1;
                continue;
            }
            let second = if second.is_finite() { second } else { 0.0 };

            let Some(category) = self.table.category_at(best_idx) else {
                stats.rejected_confidence += 1;
                continue;
            };
            if category.min_score_gap > 0.0 && best - second <= category.min_score_gap {
                stats.rejected_ambiguous += 1;
                continue;
            }
            if best < category.confidence_threshold {
                stats.rejected_confidence += 1;
                continue;
            }

            // Canvas pixels, then back through the preprocessing transform.
            let in_w = transform.input_width as f32;
            let in_h = transform.input_height as f32;
            let left = transform.to_frame_x((cx - w / 2.0) * in_w).clamp(0.0, frame_w);
            let right = transform.to_frame_x((cx + w / 2.0) * in_w).clamp(0.0, frame_w);
            let top = transform.to_frame_y((cy - h / 2.0) * in_h).clamp(0.0, frame_h);
            let bottom = transform.to_frame_y((cy + h / 2.0) * in_h).clamp(0.0, frame_h);

            let (bw, bh) = (right - left, bottom - top);
            if bw < cfg.min_box_px
                || bh < cfg.min_box_px
                || bw > cfg.max_box_fraction * frame_w
                || bh > cfg.max_box_fraction * frame_h
            {
                stats.rejected_size += 1;
                continue;
            }

            let Some(label) = self.table.label_at(best_idx) else {
                stats.rejected_confidence += 1;
                continue;
            };
            match Detection::new(
                label.clone(),
                best_idx,
                best.clamp(0.0, 1.0),
                BoundingBox::new(left, top, right, bottom),
                transform.frame_width,
                transform.frame_height,
            ) {
                Ok(det) => {
                    stats.accepted += 1;
                    detections.push(det);
                }
                Err(_) => stats.rejected_size += 1,
            }
        }

        log::debug!(
            "decoded {} of {} candidates (geometry {}, ambiguous {}, confidence {}, size {})",
            stats.accepted,
            stats.candidates,
            stats.rejected_geometry,
            stats.rejected_ambiguous,
            stats.rejected_confidence,
            stats.rejected_size
        );
        Ok((detections, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::COCO_LABELS;
    use crate::detect::tensor::{RawOutputBuilder, TensorLayout};

    const CAR: usize = 2;
    const PERSON: usize = 0;
    const KNIFE: usize = 43;

    fn decoder() -> Decoder {
        Decoder::new(
            DecoderConfig::default(),
            Arc::new(CategoryTable::coco().unwrap()),
        )
        .unwrap()
    }

    fn identity() -> LetterboxTransform {
        LetterboxTransform::identity(640, 640)
    }

    #[test]
    fn decodes_confident_candidate() {
        let out = RawOutputBuilder::new(80)
            .candidate(0.5, 0.5, 0.5, 0.4, CAR, 0.9)
            .build();
        let (dets, stats) = decoder().decode(&out, &identity()).unwrap();
        assert_eq!(stats.accepted, 1);
        let car = &dets[0];
        assert_eq!(car.label(), "car");
        assert!((car.bbox().left - 160.0).abs() < 1e-3);
        assert!((car.bbox().bottom - 448.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_by_geometry_and_threshold() {
        let out = RawOutputBuilder::new(80)
            .candidate(0.01, 0.5, 0.2, 0.2, CAR, 0.9) // center out of range
            .candidate(0.5, 0.5, 0.95, 0.2, CAR, 0.9) // too wide
            .candidate(0.5, 0.5, 0.2, 0.2, KNIFE, 0.5) // hazard needs 0.6
            .candidate(0.5, 0.5, f32::NAN, 0.2, CAR, 0.9)
            .build();
        let (dets, stats) = decoder().decode(&out, &identity()).unwrap();
        assert!(dets.is_empty());
        assert_eq!(stats.rejected_geometry, 3);
        assert_eq!(stats.rejected_confidence, 1);
    }

    #[test]
    fn person_needs_a_wider_margin() {
        let out = RawOutputBuilder::new(80)
            .candidate_with_runner_up(0.5, 0.5, 0.2, 0.4, PERSON, 0.7, Some((CAR, 0.6)))
            .candidate_with_runner_up(0.5, 0.5, 0.2, 0.4, CAR, 0.7, Some((PERSON, 0.6)))
            .build();
        let (dets, stats) = decoder().decode(&out, &identity()).unwrap();
        assert_eq!(stats.rejected_ambiguous, 1);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label(), "car");
    }

    #[test]
    fn tiny_boxes_are_dropped_after_mapping() {
        // 0.021 * 640 = 13.4px on the canvas, 6.7px on a 320px frame.
        let t = LetterboxTransform {
            scale_x: 2.0,
            scale_y: 2.0,
            pad_x: 0.0,
            pad_y: 0.0,
            input_width: 640,
            input_height: 640,
            frame_width: 320,
            frame_height: 320,
        };
        let out = RawOutputBuilder::new(80)
            .candidate(0.5, 0.5, 0.021, 0.3, CAR, 0.9)
            .build();
        let (dets, stats) = decoder().decode(&out, &t).unwrap();
        assert!(dets.is_empty());
        assert_eq!(stats.rejected_size, 1);
    }

    #[test]
    fn maps_pixel_units_through_letterbox() {
        // 1280x720 frame letterboxed into 640x640: scale 0.5, 140px bands.
        let t = LetterboxTransform {
            scale_x: 0.5,
            scale_y: 0.5,
            pad_x: 0.0,
            pad_y: 140.0,
            input_width: 640,
            input_height: 640,
            frame_width: 1280,
            frame_height: 720,
        };
        let rows = {
            let mut v = vec![0.0f32; 84];
            v[0] = 320.0;
            v[1] = 320.0;
            v[2] = 128.0;
            v[3] = 100.0;
            v[4 + CAR] = 0.8;
            v
        };
        let out = RawOutput::new(rows, 1, 84, TensorLayout::CandidateMajor, BoxUnits::InputPixels)
            .unwrap();
        let (dets, _) = decoder().decode(&out, &t).unwrap();
        let b = dets[0].bbox();
        assert!((b.left - 512.0).abs() < 1e-2);
        assert!((b.right - 768.0).abs() < 1e-2);
        assert!((b.top - 260.0).abs() < 1e-2);
        assert!((b.bottom - 460.0).abs() < 1e-2);
    }

    #[test]
    fn boxes_stay_inside_frame() {
        let mut builder = RawOutputBuilder::new(80);
        for i in 0..20 {
            let c = 0.06 + i as f32 * 0.045;
            builder = builder.candidate(c, 1.0 - c, 0.5, 0.5, CAR, 0.9);
        }
        let (dets, _) = decoder()
            .decode(&builder.build(), &LetterboxTransform::identity(640, 640))
            .unwrap();
        assert!(!dets.is_empty());
        for d in dets {
            let b = d.bbox();
            assert!(b.left >= 0.0 && b.top >= 0.0 && b.right <= 640.0 && b.bottom <= 640.0);
            assert!((0.0..=1.0).contains(&d.relative_size()));
        }
    }

    #[test]
    fn rejects_shape_mismatch() {
        let out = RawOutputBuilder::new(3).candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9).build();
        assert!(matches!(
            decoder().decode(&out, &identity()),
            Err(PipelineError::InvalidInput(_))
        ));
        assert_eq!(COCO_LABELS.len(), 80);
    }
}
