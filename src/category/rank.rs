use std::sync::Arc;

use super::{Category, CategoryTable};
use crate::detect::Detection;
use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_MAX_ALERTS: usize = 3;
pub const MAX_ALERTS_LIMIT: usize = 10;

/// A detection tagged with its category.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranked {
    pub detection: Detection,
    pub category: Category,
}

/// Size-gated detections of one frame in priority order.
///
/// `ranked()` is the top-K list that may be announced; `all()` also includes
/// detections that were visible but outranked.
#[derive(Clone, Debug, Default)]
pub struct CategorizedFrame {
    entries: Vec<Ranked>,
    top_k: usize,
}

impl CategorizedFrame {
    pub fn ranked(&self) -> &[Ranked] {
        &self.entries[..self.top_k.min(self.entries.len())]
    }

    pub fn all(&self) -> &[Ranked] {
        &self.entries
    }

    pub fn visible_labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.detection.label())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct Categorizer {
    table: Arc<CategoryTable>,
    max_alerts: usize,
}

impl Categorizer {
    pub fn new(table: Arc<CategoryTable>, max_alerts: usize) -> PipelineResult<Self> {
        if !(1..=MAX_ALERTS_LIMIT).contains(&max_alerts) {
            return Err(PipelineError::configuration(format!(
                "max_alerts must be within 1..={}, got {}",
                MAX_ALERTS_LIMIT, max_alerts
            )));
        }
        Ok(Self { table, max_alerts })
    }

    pub fn max_alerts(&self) -> usize {
        self.max_alerts
    }

    pub fn categorize(&self, detections: Vec<Detection>) -> CategorizedFrame {
        let mut entries: Vec<Ranked> = detections
            .into_iter()
            .filter_map(|detection| {
                let category = self.table.resolve(detection.label());
                if detection.relative_size() < category.min_relative_size {
                    log::debug!(
                        "dropping {} ({:.3} of frame, min {:.3})",
                        detection.label(),
                        detection.relative_size(),
                        category.min_relative_size
                    );
                    return None;
                }
                Some(Ranked {
                    category: category.clone(),
                    detection,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.category.tier.cmp(&b.category.tier).then_with(|| {
                b.detection
                    .relative_size()
                    .total_cmp(&a.detection.relative_size())
            })
        });

        CategorizedFrame {
            entries,
            top_k: self.max_alerts,
        }
    }
}
