//! Raw detector output.
//!
//! A detector emits one row of `4 + num_classes` values per candidate: box
//! center-x, center-y, width, height, then one score per class. Exports differ
//! in whether candidates or attributes are the outer axis and in whether box
//! values are normalized or in model-canvas pixels; `RawOutput` records both so
//! the decoder can read any of them without a transpose copy.

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Number of box attributes preceding the class scores.
pub const BOX_ATTRIBUTES: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[num_candidates][4 + num_classes]`.
    #[default]
    CandidateMajor,
    /// `[4 + num_classes][num_candidates]` (native YOLOv8/11 export).
    AttributeMajor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
    /// Box values in `[0, 1]` relative to the model canvas.
    #[default]
    Normalized,
    /// Box values in model-canvas pixels.
    InputPixels,
}

#[derive(Clone, Debug)]
pub struct RawOutput {
    data: Vec<f32>,
    candidates: usize,
    attributes: usize,
    layout: TensorLayout,
    units: BoxUnits,
}

impl RawOutput {
    pub fn new(
        data: Vec<f32>,
        candidates: usize,
        attributes: usize,
        layout: TensorLayout,
        units: BoxUnits,
    ) -> Result<Self> {
        if attributes <= BOX_ATTRIBUTES {
            return Err(anyhow!(
                "output rows need more than {} attributes, got {}",
                BOX_ATTRIBUTES,
                attributes
            ));
        }
        let expected = candidates
            .checked_mul(attributes)
            .ok_or_else(|| anyhow!("output dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "output holds {} values, expected {}x{} = {}",
                data.len(),
                candidates,
                attributes,
                expected
            ));
        }
        Ok(Self {
            data,
            candidates,
            attributes,
            layout,
            units,
        })
    }

    /// An output with no candidates.
    pub fn empty(num_classes: usize) -> Self {
        Self {
            data: Vec::new(),
            candidates: 0,
            attributes: BOX_ATTRIBUTES + num_classes,
            layout: TensorLayout::CandidateMajor,
            units: BoxUnits::Normalized,
        }
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn attributes(&self) -> usize {
        self.attributes
    }

    pub fn num_classes(&self) -> usize {
        self.attributes - BOX_ATTRIBUTES
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn units(&self) -> BoxUnits {
        self.units
    }

    /// Value of `attribute` for `candidate`, independent of layout.
    #[inline]
    pub fn value(&self, candidate: usize, attribute: usize) -> f32 {
        match self.layout {
            TensorLayout::CandidateMajor => self.data[candidate * self.attributes + attribute],
            TensorLayout::AttributeMajor => self.data[attribute * self.candidates + candidate],
        }
    }
}

/// Assembles candidate-major, normalized outputs. Used by the stub backend and tests.
#[derive(Clone, Debug)]
pub struct RawOutputBuilder {
    num_classes: usize,
    rows: Vec<f32>,
}

impl RawOutputBuilder {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            rows: Vec::new(),
        }
    }

    /// Add a candidate whose only non-zero score is `score` for `class_index`.
    pub fn candidate(self, cx: f32, cy: f32, w: f32, h: f32, class_index: usize, score: f32) -> Self {
        self.candidate_with_runner_up(cx, cy, w, h, class_index, score, None)
    }

    /// Add a candidate with an additional competing class score.
    #[allow(clippy::too_many_arguments)]
    pub fn candidate_with_runner_up(
        mut self,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        class_index: usize,
        score: f32,
        runner_up: Option<(usize, f32)>,
    ) -> Self {
        let mut row = vec![0.0f32; BOX_ATTRIBUTES + self.num_classes];
        row[0] = cx;
        row[1] = cy;
        row[2] = w;
        row[3] = h;
        if class_index < self.num_classes {
            row[BOX_ATTRIBUTES + class_index] = score;
        }
        if let Some((idx, s)) = runner_up {
            if idx < self.num_classes {
                row[BOX_ATTRIBUTES + idx] = s;
            }
        }
        self.rows.extend_from_slice(&row);
        self
    }

    pub fn build(self) -> RawOutput {
        let attributes = BOX_ATTRIBUTES + self.num_classes;
        RawOutput {
            candidates: self.rows.len() / attributes,
            data: self.rows,
            attributes,
            layout: TensorLayout::CandidateMajor,
            units: BoxUnits::Normalized,
        }
    }
}
