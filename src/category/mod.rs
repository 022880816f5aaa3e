//! Safety categories.
//!
//! A [`CategoryTable`] maps every detector label to a [`Category`]: its safety
//! tier, the thresholds the decoder and categorizer apply to it, and the
//! announcement cooldown. The table is built once at startup and shared
//! read-only. Construction fails with [`PipelineError::Configuration`] unless
//! every label the detector can emit is covered exactly once.

mod coco;
mod rank;

pub use coco::COCO_LABELS;
pub use rank::{CategorizedFrame, Categorizer, Ranked, DEFAULT_MAX_ALERTS, MAX_ALERTS_LIMIT};

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::alert::DistanceThresholds;
use crate::error::{PipelineError, PipelineResult};

/// Score margin required over the runner-up class when a tier does not set one.
pub const DEFAULT_MIN_SCORE_GAP: f32 = 0.05;

// ----------------------------------------------------------------------------
// Table description (TOML)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    pub tiers: Vec<TierSpec>,
    #[serde(default)]
    pub overrides: BTreeMap<String, LabelOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierSpec {
    pub tier: u8,
    pub name: String,
    #[serde(default)]
    pub min_relative_size: f32,
    pub confidence: f32,
    pub cooldown_ms: u64,
    #[serde(default)]
    pub min_score_gap: Option<f32>,
    #[serde(default)]
    pub distance: Option<DistanceThresholds>,
    pub labels: Vec<String>,
}

/// Per-label adjustments on top of the label's tier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelOverride {
    pub confidence: Option<f32>,
    pub min_score_gap: Option<f32>,
    pub min_relative_size: Option<f32>,
}

// ----------------------------------------------------------------------------
// Resolved table
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// 1 is the most urgent tier.
    pub tier: u8,
    pub tier_name: Arc<str>,
    pub min_relative_size: f32,
    pub confidence_threshold: f32,
    pub min_score_gap: f32,
    pub cooldown: Duration,
    pub distance: Option<DistanceThresholds>,
}

impl Category {
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown.as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSummary {
    pub tier: u8,
    pub name: Arc<str>,
    pub labels: usize,
    pub cooldown_ms: u64,
}

#[derive(Debug)]
pub struct CategoryTable {
    labels: Vec<Arc<str>>,
    by_index: Vec<Category>,
    by_label: HashMap<Arc<str>, usize>,
    fallback: Category,
    tiers: Vec<TierSummary>,
}

impl CategoryTable {
    /// Resolve `spec` against the detector's label list (class-index order).
    pub fn build(spec: &TableSpec, labels: &[String]) -> PipelineResult<Self> {
        if labels.is_empty() {
            return Err(PipelineError::configuration("detector label list is empty"));
        }
        if spec.tiers.is_empty() {
            return Err(PipelineError::configuration("category table has no tiers"));
        }

        let pattern = label_pattern()?;
        let mut seen = HashSet::new();
        for label in labels {
            if !pattern.is_match(label) {
                return Err(PipelineError::configuration(format!(
                    "label {:?} is not a valid label name",
                    label
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(PipelineError::configuration(format!(
                    "duplicate label {:?} in detector label list",
                    label
                )));
            }
        }

        let mut tiers: Vec<&TierSpec> = spec.tiers.iter().collect();
        tiers.sort_by_key(|t| t.tier);
        validate_tiers(&tiers)?;

        // label -> tier spec
        let mut assigned: HashMap<&str, &TierSpec> = HashMap::new();
        for &tier in &tiers {
            for label in &tier.labels {
                if !seen.contains(label.as_str()) {
                    return Err(PipelineError::configuration(format!(
                        "tier {} names unknown label {:?}",
                        tier.tier, label
                    )));
                }
                if let Some(prev) = assigned.insert(label.as_str(), tier) {
                    return Err(PipelineError::configuration(format!(
                        "label {:?} is assigned to both tier {} and tier {}",
                        label, prev.tier, tier.tier
                    )));
                }
            }
        }

        let uncovered: Vec<&str> = labels
            .iter()
            .map(String::as_str)
            .filter(|l| !assigned.contains_key(l))
            .collect();
        if !uncovered.is_empty() {
            return Err(PipelineError::configuration(format!(
                "labels not covered by any tier: {}",
                uncovered.join(", ")
            )));
        }

        for (label, ov) in &spec.overrides {
            if !seen.contains(label.as_str()) {
                return Err(PipelineError::configuration(format!(
                    "override for unknown label {:?}",
                    label
                )));
            }
            validate_override(label, ov)?;
        }

        let names: HashMap<u8, Arc<str>> = tiers
            .iter()
            .map(|t| (t.tier, Arc::<str>::from(t.name.as_str())))
            .collect();
        let tier_category = |t: &TierSpec| Category {
            tier: t.tier,
            tier_name: names[&t.tier].clone(),
            min_relative_size: t.min_relative_size,
            confidence_threshold: t.confidence,
            min_score_gap: t.min_score_gap.unwrap_or(DEFAULT_MIN_SCORE_GAP),
            cooldown: Duration::from_millis(t.cooldown_ms),
            distance: t.distance,
        };

        let mut by_index = Vec::with_capacity(labels.len());
        let mut by_label = HashMap::with_capacity(labels.len());
        let mut interned = Vec::with_capacity(labels.len());
        for (index, label) in labels.iter().enumerate() {
            let tier = assigned[label.as_str()];
            let mut category = tier_category(tier);
            if let Some(ov) = spec.overrides.get(label) {
                if let Some(v) = ov.confidence {
                    category.confidence_threshold = v;
                }
                if let Some(v) = ov.min_score_gap {
                    category.min_score_gap = v;
                }
                if let Some(v) = ov.min_relative_size {
                    category.min_relative_size = v;
                }
            }
            let name: Arc<str> = Arc::from(label.as_str());
            by_label.insert(name.clone(), index);
            interned.push(name);
            by_index.push(category);
        }

        let lowest = tiers[tiers.len() - 1];
        let summaries = tiers
            .iter()
            .map(|t| TierSummary {
                tier: t.tier,
                name: names[&t.tier].clone(),
                labels: t.labels.len(),
                cooldown_ms: t.cooldown_ms,
            })
            .collect();

        Ok(Self {
            labels: interned,
            by_index,
            by_label,
            fallback: tier_category(lowest),
            tiers: summaries,
        })
    }

    pub fn from_toml_str(raw: &str, labels: &[String]) -> PipelineResult<Self> {
        let spec: TableSpec = toml::from_str(raw)
            .map_err(|e| PipelineError::configuration(format!("invalid category table: {}", e)))?;
        Self::build(&spec, labels)
    }

    pub fn load(path: &Path, labels: &[String]) -> PipelineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration(format!(
                "failed to read category table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&raw, labels).map_err(|e| match e {
            PipelineError::Configuration(msg) => {
                PipelineError::configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Built-in table for the 80 COCO classes.
    pub fn coco() -> PipelineResult<Self> {
        let labels: Vec<String> = COCO_LABELS.iter().map(|l| l.to_string()).collect();
        Self::build(&coco::table_spec(), &labels)
    }

    /// Labels in class-index order.
    pub fn labels(&self) -> &[Arc<str>] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn tiers(&self) -> &[TierSummary] {
        &self.tiers
    }

    pub(crate) fn label_at(&self, class_index: usize) -> Option<&Arc<str>> {
        self.labels.get(class_index)
    }

    pub fn category_at(&self, class_index: usize) -> Option<&Category> {
        self.by_index.get(class_index)
    }

    /// Strict lookup; an unmapped label is a configuration error.
    pub fn lookup(&self, label: &str) -> PipelineResult<&Category> {
        self.by_label
            .get(label)
            .map(|&i| &self.by_index[i])
            .ok_or_else(|| {
                PipelineError::configuration(format!("label {:?} is not in the category table", label))
            })
    }

    /// Lenient lookup; unmapped labels fall back to the lowest-priority tier.
    pub fn resolve(&self, label: &str) -> &Category {
        match self.by_label.get(label) {
            Some(&i) => &self.by_index[i],
            None => {
                log::warn!(
                    "label {:?} not in category table, treating as tier {} ({})",
                    label,
                    self.fallback.tier,
                    self.fallback.tier_name
                );
                &self.fallback
            }
        }
    }

    /// The category applied to unmapped labels.
    pub fn fallback(&self) -> &Category {
        &self.fallback
    }
}

/// Build the table a detector will run with: a TOML table over a label file,
/// a TOML table over the COCO labels, or the built-in COCO table.
///
/// A label file without a table is a configuration error; the built-in table
/// only covers COCO.
pub fn load_table(
    categories: Option<&Path>,
    labels: Option<&Path>,
) -> anyhow::Result<CategoryTable> {
    let table = match (categories, labels) {
        (Some(categories), Some(labels)) => {
            let labels = load_labels(labels)?;
            CategoryTable::load(categories, &labels)?
        }
        (Some(categories), None) => {
            let labels: Vec<String> = COCO_LABELS.iter().map(|l| l.to_string()).collect();
            CategoryTable::load(categories, &labels)?
        }
        (None, Some(labels)) => {
            return Err(PipelineError::configuration(format!(
                "label file {} needs a category table; the built-in table only covers COCO",
                labels.display()
            ))
            .into())
        }
        (None, None) => CategoryTable::coco()?,
    };
    Ok(table)
}

/// Read a newline-separated label file. Blank lines and `#` comments are skipped.
pub fn load_labels(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read label file {}", path.display()))?;
    Ok(parse_labels(&raw))
}

pub fn parse_labels(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn label_pattern() -> PipelineResult<&'static Regex> {
    static LABEL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    LABEL_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.'-]{0,63}$"))
        .as_ref()
        .map_err(|e| PipelineError::configuration(format!("label pattern: {}", e)))
}

fn validate_tiers(tiers: &[&TierSpec]) -> PipelineResult<()> {
    let mut prev: Option<&TierSpec> = None;
    for &tier in tiers {
        if tier.tier == 0 {
            return Err(PipelineError::configuration("tier numbers start at 1"));
        }
        if tier.name.trim().is_empty() {
            return Err(PipelineError::configuration(format!("tier {} has no name", tier.tier)));
        }
        if tier.labels.is_empty() {
            return Err(PipelineError::configuration(format!(
                "tier {} ({}) has no labels",
                tier.tier, tier.name
            )));
        }
        check_unit("confidence", tier.tier, tier.confidence)?;
        check_unit("min_relative_size", tier.tier, tier.min_relative_size)?;
        if let Some(gap) = tier.min_score_gap {
            check_gap(gap, &format!("tier {}", tier.tier))?;
        }
        if let Some(distance) = &tier.distance {
            distance.validate()?;
        }
        if let Some(p) = prev {
            if p.tier == tier.tier {
                return Err(PipelineError::configuration(format!(
                    "tier {} is defined twice",
                    tier.tier
                )));
            }
            if tier.cooldown_ms < p.cooldown_ms {
                return Err(PipelineError::configuration(format!(
                    "cooldown of tier {} ({}ms) is shorter than tier {} ({}ms)",
                    tier.tier, tier.cooldown_ms, p.tier, p.cooldown_ms
                )));
            }
        }
        prev = Some(tier);
    }
    Ok(())
}

fn validate_override(label: &str, ov: &LabelOverride) -> PipelineResult<()> {
    let bad = |field: &str, v: f32| {
        PipelineError::configuration(format!(
            "override {} for {:?} must be within [0, 1], got {}",
            field, label, v
        ))
    };
    if let Some(v) = ov.confidence {
        if !(0.0..=1.0).contains(&v) {
            return Err(bad("confidence", v));
        }
    }
    if let Some(v) = ov.min_relative_size {
        if !(0.0..=1.0).contains(&v) {
            return Err(bad("min_relative_size", v));
        }
    }
    if let Some(v) = ov.min_score_gap {
        check_gap(v, label)?;
    }
    Ok(())
}

fn check_unit(field: &str, tier: u8, value: f32) -> PipelineResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::configuration(format!(
            "tier {} {} must be within [0, 1], got {}",
            tier, field, value
        )))
    }
}

fn check_gap(value: f32, owner: &str) -> PipelineResult<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::configuration(format!(
            "min_score_gap for {} must be within [0, 1), got {}",
            owner, value
        )))
    }
}
