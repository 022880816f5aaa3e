use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::category::COCO_LABELS;
use crate::detect::backend::InferenceBackend;
use crate::detect::tensor::{RawOutput, RawOutputBuilder};
use crate::preprocess::InputTensor;

/// One scripted inference result.
#[derive(Clone, Debug)]
pub enum StubResponse {
    Output(RawOutput),
    Fail(String),
}

/// Scripted backend for tests and the demo daemon.
///
/// Responses are replayed in order. Once the script runs out the last
/// response repeats; an empty script yields empty outputs.
pub struct StubBackend {
    num_classes: usize,
    script: VecDeque<StubResponse>,
    last: Option<StubResponse>,
    calls: u64,
}

impl StubBackend {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            script: VecDeque::new(),
            last: None,
            calls: 0,
        }
    }

    pub fn with_outputs(num_classes: usize, outputs: impl IntoIterator<Item = RawOutput>) -> Self {
        let mut stub = Self::new(num_classes);
        for output in outputs {
            stub.push_output(output);
        }
        stub
    }

    /// A short street scene over the COCO labels: a person ahead and a bench
    /// on the left while a car approaches from the right, then holds.
    pub fn demo_scene() -> Self {
        let n = COCO_LABELS.len();
        let frames = (0..10).map(|step| {
            let approach = step as f32 * 0.04;
            RawOutputBuilder::new(n)
                .candidate(0.5, 0.55, 0.18, 0.5, 0, 0.82)
                .candidate(0.78, 0.6, 0.2 + approach, 0.18 + approach, 2, 0.9)
                .candidate(0.17, 0.62, 0.3, 0.6, 13, 0.66)
                .build()
        });
        Self::with_outputs(n, frames.collect::<Vec<_>>())
    }

    pub fn push_output(&mut self, output: RawOutput) {
        self.script.push_back(StubResponse::Output(output));
    }

    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.script.push_back(StubResponse::Fail(message.into()));
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _input: &InputTensor) -> Result<RawOutput> {
        self.calls += 1;
        if let Some(next) = self.script.pop_front() {
            self.last = Some(next);
        }
        match &self.last {
            Some(StubResponse::Output(output)) => Ok(output.clone()),
            Some(StubResponse::Fail(message)) => Err(anyhow!("{}", message)),
            None => Ok(RawOutput::empty(self.num_classes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RgbFrame;
    use crate::preprocess::{Preprocessor, ResizeMode};

    fn input() -> InputTensor {
        let frame = RgbFrame::from_rgb(8, 8, vec![0u8; 8 * 8 * 3]).unwrap();
        Preprocessor::new(16, ResizeMode::Letterbox)
            .unwrap()
            .prepare(&frame)
            .unwrap()
    }

    #[test]
    fn replays_script_then_repeats_last() {
        let mut stub = StubBackend::new(2);
        stub.push_failure("device lost");
        stub.push_output(RawOutputBuilder::new(2).candidate(0.5, 0.5, 0.2, 0.2, 1, 0.9).build());

        assert!(stub.infer(&input()).is_err());
        assert_eq!(stub.infer(&input()).unwrap().candidates(), 1);
        assert_eq!(stub.infer(&input()).unwrap().candidates(), 1);
        assert_eq!(stub.calls(), 3);
    }

    #[test]
    fn empty_script_yields_empty_output() {
        let mut stub = StubBackend::new(80);
        let out = stub.infer(&input()).unwrap();
        assert_eq!(out.candidates(), 0);
        assert_eq!(out.num_classes(), 80);
    }
}
