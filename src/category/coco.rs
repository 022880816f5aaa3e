use std::collections::BTreeMap;

use super::{LabelOverride, TableSpec, TierSpec};
use crate::alert::DistanceThresholds;

/// COCO class names in detector index order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

const HAZARDS: &[&str] = &[
    "knife", "scissors", "oven", "toaster", "microwave", "fire hydrant", "parking meter",
    "traffic light", "stop sign", "horse", "cow", "elephant", "bear",
];

const LIVING: &[&str] = &["person", "cat", "dog", "bird", "sheep", "zebra", "giraffe"];

const VEHICLES: &[&str] = &[
    "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
];

const OBSTACLES: &[&str] = &[
    "chair", "couch", "dining table", "bed", "bench", "toilet", "refrigerator", "tv", "sink",
    "suitcase", "backpack", "potted plant", "surfboard", "skateboard", "skis", "snowboard",
];

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

pub(super) fn table_spec() -> TableSpec {
    let named: Vec<&str> = [HAZARDS, LIVING, VEHICLES, OBSTACLES].concat();
    let incidental: Vec<String> = COCO_LABELS
        .iter()
        .filter(|l| !named.contains(l))
        .map(|l| l.to_string())
        .collect();

    let mut overrides = BTreeMap::new();
    // Person is the class most often confused with mannequins and posters.
    overrides.insert(
        "person".to_string(),
        LabelOverride {
            min_score_gap: Some(0.15),
            ..Default::default()
        },
    );

    TableSpec {
        tiers: vec![
            TierSpec {
                tier: 1,
                name: "immediate hazard".into(),
                min_relative_size: 0.0,
                confidence: 0.60,
                cooldown_ms: 800,
                min_score_gap: None,
                distance: Some(DistanceThresholds {
                    very_close: 0.35,
                    nearby: 0.15,
                    in_the_distance: 0.05,
                }),
                labels: owned(HAZARDS),
            },
            TierSpec {
                tier: 2,
                name: "person or animal".into(),
                min_relative_size: 0.02,
                confidence: 0.45,
                cooldown_ms: 1200,
                min_score_gap: None,
                distance: None,
                labels: owned(LIVING),
            },
            TierSpec {
                tier: 3,
                name: "vehicle".into(),
                min_relative_size: 0.02,
                confidence: 0.45,
                cooldown_ms: 1600,
                min_score_gap: None,
                distance: None,
                labels: owned(VEHICLES),
            },
            TierSpec {
                tier: 4,
                name: "obstacle".into(),
                min_relative_size: 0.15,
                confidence: 0.50,
                cooldown_ms: 2500,
                min_score_gap: None,
                distance: None,
                labels: owned(OBSTACLES),
            },
            TierSpec {
                tier: 5,
                name: "object".into(),
                min_relative_size: 0.15,
                confidence: 0.35,
                cooldown_ms: 4000,
                min_score_gap: None,
                distance: None,
                labels: incidental,
            },
        ],
        overrides,
    }
}
