//! Announcement throttling.
//!
//! The scheduler remembers when each key was last announced. Entries for keys
//! that are no longer visible are dropped every frame, so an object that leaves
//! the view and comes back is announced again immediately.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::alert::spatial::SpatialDescriber;
use crate::category::{CategorizedFrame, Ranked, DEFAULT_MAX_ALERTS};

/// What a cooldown is tracked against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKey {
    /// All detections of a label share one cooldown.
    #[default]
    Label,
    /// Label plus direction bucket; the same label on both sides alerts twice.
    LabelAndDirection,
}

pub struct AlertScheduler {
    history: HashMap<String, u64>,
    max_alerts: usize,
    key_policy: CooldownKey,
    describer: SpatialDescriber,
}

impl Default for AlertScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ALERTS, CooldownKey::Label, SpatialDescriber::default())
    }
}

impl AlertScheduler {
    pub fn new(max_alerts: usize, key_policy: CooldownKey, describer: SpatialDescriber) -> Self {
        Self {
            history: HashMap::new(),
            max_alerts: max_alerts.max(1),
            key_policy,
            describer,
        }
    }

    /// Pick the ranked detections due for announcement at `now_ms`.
    ///
    /// Returned in priority order; each returned key is stamped with `now_ms`.
    pub fn schedule<'a>(&mut self, frame: &'a CategorizedFrame, now_ms: u64) -> Vec<&'a Ranked> {
        let visible: HashSet<String> = frame.all().iter().map(|r| self.key_for(r)).collect();
        let before = self.history.len();
        self.history.retain(|key, _| visible.contains(key));
        if self.history.len() != before {
            log::debug!(
                "cleared cooldowns for {} keys no longer in view",
                before - self.history.len()
            );
        }

        let mut due = Vec::new();
        for ranked in frame.ranked() {
            if due.len() == self.max_alerts {
                break;
            }
            let key = self.key_for(ranked);
            let eligible = match self.history.get(&key) {
                None => true,
                Some(&last) => now_ms.saturating_sub(last) > ranked.category.cooldown_ms(),
            };
            if eligible {
                self.history.insert(key, now_ms);
                due.push(ranked);
            }
        }
        due
    }

    /// Forget all announcement history.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn tracked(&self) -> usize {
        self.history.len()
    }

    fn key_for(&self, ranked: &Ranked) -> String {
        let det = &ranked.detection;
        match self.key_policy {
            CooldownKey::Label => det.label().to_string(),
            CooldownKey::LabelAndDirection => {
                let direction = self.describer.direction(det.center_x(), det.frame_width());
                format!("{}@{}", det.label(), direction.as_str())
            }
        }
    }
}
