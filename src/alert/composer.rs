use serde::Serialize;

use crate::alert::haptic::HapticPattern;
use crate::alert::spatial::{Direction, Distance, SpatialDescriber};
use crate::category::Ranked;

/// One navigation cue, ready for speech and haptic output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub label: String,
    pub tier: u8,
    pub tier_name: String,
    pub confidence: f32,
    pub direction: Direction,
    pub distance: Distance,
    pub haptic: HapticPattern,
}

impl Alert {
    /// An immediate hazard that is already very close. Callers escalate these
    /// (interrupt speech, repeat the urgent pattern).
    pub fn is_critical(&self) -> bool {
        self.tier <= 1 && self.distance == Distance::VeryClose
    }

    /// Spoken form, e.g. "Danger, knife very close ahead".
    pub fn utterance(&self) -> String {
        let prefix = if self.is_critical() {
            "Danger, "
        } else if self.tier <= 1 {
            "Caution, "
        } else {
            ""
        };
        format!(
            "{}{} {} {}",
            prefix,
            self.label,
            self.distance.phrase(),
            self.direction.phrase()
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlertComposer {
    describer: SpatialDescriber,
}

impl AlertComposer {
    pub fn new(describer: SpatialDescriber) -> Self {
        Self { describer }
    }

    /// Build alerts in the order given.
    pub fn compose(&self, due: &[&Ranked]) -> Vec<Alert> {
        due.iter()
            .map(|ranked| {
                let det = &ranked.detection;
                let category = &ranked.category;
                let placement =
                    self.describer
                        .describe_with(det, det.frame_width(), category.distance.as_ref());
                Alert {
                    label: det.label().to_string(),
                    tier: category.tier,
                    tier_name: category.tier_name.to_string(),
                    confidence: det.confidence(),
                    direction: placement.direction,
                    distance: placement.distance,
                    haptic: HapticPattern::for_tier(category.tier),
                }
            })
            .collect()
    }
}
