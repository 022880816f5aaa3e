//! Single-frame orchestration.
//!
//! The navigator owns every piece of per-session state: the frame gate, the
//! announcement history and the failure counter. It is driven by exactly one
//! thread, so none of that state is locked.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alert::{
    Alert, AlertComposer, AlertScheduler, CooldownKey, DirectionScheme, DistanceThresholds,
    SpatialDescriber,
};
use crate::category::{Categorizer, CategoryTable, DEFAULT_MAX_ALERTS};
use crate::detect::{Decoder, DecoderConfig, InferenceBackend, NmsConfig, RawOutput, Suppressor};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::RgbFrame;
use crate::pipeline::gate::FrameGate;
use crate::preprocess::{LetterboxTransform, Preprocessor, ResizeMode, DEFAULT_INPUT_SIZE};

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 250;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigatorSettings {
    pub input_size: u32,
    pub resize_mode: ResizeMode,
    pub frame_interval_ms: u64,
    pub max_alerts: usize,
    pub cooldown_key: CooldownKey,
    pub direction_scheme: DirectionScheme,
    pub distance: DistanceThresholds,
    pub decoder: DecoderConfig,
    pub nms: NmsConfig,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            resize_mode: ResizeMode::default(),
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            max_alerts: DEFAULT_MAX_ALERTS,
            cooldown_key: CooldownKey::default(),
            direction_scheme: DirectionScheme::default(),
            distance: DistanceThresholds::default(),
            decoder: DecoderConfig::default(),
            nms: NmsConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Arrived before the frame interval elapsed; not processed.
    RateLimited,
    /// At least one alert is due.
    Alerts(Vec<Alert>),
    /// Objects are visible but all of them are cooling down.
    Quiet,
    /// Nothing visible.
    Clear,
    Failed(PipelineError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTimings {
    pub preprocess: Duration,
    pub inference: Duration,
    pub postprocess: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    pub outcome: FrameOutcome,
    /// Detections that survived suppression and the size gate.
    pub visible: usize,
    pub timings: FrameTimings,
}

impl FrameReport {
    pub fn alerts(&self) -> &[Alert] {
        match &self.outcome {
            FrameOutcome::Alerts(alerts) => alerts,
            _ => &[],
        }
    }
}

pub struct Navigator {
    preprocessor: Preprocessor,
    backend: Box<dyn InferenceBackend>,
    decoder: Decoder,
    suppressor: Suppressor,
    categorizer: Categorizer,
    scheduler: AlertScheduler,
    composer: AlertComposer,
    gate: FrameGate,
    consecutive_failures: u32,
    next_frame_id: u64,
}

impl Navigator {
    pub fn new(
        table: Arc<CategoryTable>,
        settings: NavigatorSettings,
        backend: Box<dyn InferenceBackend>,
    ) -> PipelineResult<Self> {
        settings.distance.validate()?;
        let describer = SpatialDescriber::new(settings.direction_scheme, settings.distance);
        let categorizer = Categorizer::new(table.clone(), settings.max_alerts)?;
        log::info!(
            "navigator ready: backend={} labels={} input={} frame_interval={}ms max_alerts={}",
            backend.name(),
            table.len(),
            settings.input_size,
            settings.frame_interval_ms,
            settings.max_alerts
        );
        Ok(Self {
            preprocessor: Preprocessor::new(settings.input_size, settings.resize_mode)?,
            decoder: Decoder::new(settings.decoder, table)?,
            suppressor: Suppressor::new(settings.nms)?,
            scheduler: AlertScheduler::new(settings.max_alerts, settings.cooldown_key, describer),
            composer: AlertComposer::new(describer),
            gate: FrameGate::new(settings.frame_interval_ms),
            categorizer,
            backend,
            consecutive_failures: 0,
            next_frame_id: 0,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> PipelineResult<()> {
        self.backend
            .warm_up()
            .map_err(|e| PipelineError::InferenceFailure(format!("warm-up: {:#}", e)))
    }

    /// Run the full pipeline on one camera frame.
    pub fn process_frame(&mut self, frame: &RgbFrame, now_ms: u64) -> FrameReport {
        let frame_id = self.next_id();
        if !self.gate.try_admit(now_ms) {
            return self.report(frame_id, FrameOutcome::RateLimited, 0, FrameTimings::default());
        }

        let mut timings = FrameTimings::default();
        let started = Instant::now();
        let tensor = match self.preprocessor.prepare(frame) {
            Ok(tensor) => tensor,
            Err(e) => return self.fail(frame_id, e, timings),
        };
        timings.preprocess = started.elapsed();

        let started = Instant::now();
        let raw = self.backend.infer(&tensor);
        timings.inference = started.elapsed();
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                let err = PipelineError::InferenceFailure(format!("{:#}", e));
                return self.fail(frame_id, err, timings);
            }
        };

        self.postprocess(frame_id, &raw, tensor.transform(), now_ms, timings)
    }

    /// Run everything after inference on an externally produced output.
    pub fn process_output(
        &mut self,
        raw: &RawOutput,
        transform: &LetterboxTransform,
        now_ms: u64,
    ) -> FrameReport {
        let frame_id = self.next_id();
        if !self.gate.try_admit(now_ms) {
            return self.report(frame_id, FrameOutcome::RateLimited, 0, FrameTimings::default());
        }
        self.postprocess(frame_id, raw, transform, now_ms, FrameTimings::default())
    }

    /// Failures since the last successful frame.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Forget announcement history, the frame gate and the failure streak.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.gate.reset();
        self.consecutive_failures = 0;
        log::debug!("navigator state reset");
    }

    fn postprocess(
        &mut self,
        frame_id: u64,
        raw: &RawOutput,
        transform: &LetterboxTransform,
        now_ms: u64,
        mut timings: FrameTimings,
    ) -> FrameReport {
        let started = Instant::now();
        let detections = match self.decoder.decode(raw, transform) {
            Ok((detections, _)) => detections,
            Err(e) => return self.fail(frame_id, e, timings),
        };
        let kept = self.suppressor.suppress(detections);
        let categorized = self.categorizer.categorize(kept);
        let due = self.scheduler.schedule(&categorized, now_ms);
        let alerts = self.composer.compose(&due);
        timings.postprocess = started.elapsed();

        self.consecutive_failures = 0;
        let visible = categorized.all().len();
        let outcome = if !alerts.is_empty() {
            FrameOutcome::Alerts(alerts)
        } else if categorized.is_empty() {
            FrameOutcome::Clear
        } else {
            FrameOutcome::Quiet
        };
        log::debug!(
            "frame {}: {} visible, outcome {:?} (pre {:?}, infer {:?}, post {:?})",
            frame_id,
            visible,
            outcome,
            timings.preprocess,
            timings.inference,
            timings.postprocess
        );
        self.report(frame_id, outcome, visible, timings)
    }

    fn fail(&mut self, frame_id: u64, error: PipelineError, timings: FrameTimings) -> FrameReport {
        if matches!(error, PipelineError::InferenceFailure(_)) {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        log::warn!(
            "frame {} skipped: {} (consecutive inference failures: {})",
            frame_id,
            error,
            self.consecutive_failures
        );
        self.report(frame_id, FrameOutcome::Failed(error), 0, timings)
    }

    fn report(
        &self,
        frame_id: u64,
        outcome: FrameOutcome,
        visible: usize,
        timings: FrameTimings,
    ) -> FrameReport {
        FrameReport {
            frame_id,
            outcome,
            visible,
            timings,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_frame_id += 1;
        self.next_frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{RawOutputBuilder, StubBackend};

    const CAR: usize = 2;

    fn navigator(stub: StubBackend, frame_interval_ms: u64) -> Navigator {
        let settings = NavigatorSettings {
            frame_interval_ms,
            ..Default::default()
        };
        Navigator::new(
            Arc::new(CategoryTable::coco().unwrap()),
            settings,
            Box::new(stub),
        )
        .unwrap()
    }

    fn frame() -> RgbFrame {
        RgbFrame::from_rgb(64, 64, vec![90u8; 64 * 64 * 3]).unwrap()
    }

    fn car_output() -> RawOutput {
        RawOutputBuilder::new(80)
            .candidate(0.5, 0.5, 0.5, 0.5, CAR, 0.9)
            .build()
    }

    #[test]
    fn rate_limits_before_doing_work() {
        let mut nav = navigator(StubBackend::with_outputs(80, [car_output()]), 250);
        assert!(matches!(nav.process_frame(&frame(), 0).outcome, FrameOutcome::Alerts(_)));
        assert_eq!(nav.process_frame(&frame(), 100).outcome, FrameOutcome::RateLimited);
    }

    #[test]
    fn cooldown_silences_repeat_frames() {
        let mut nav = navigator(StubBackend::with_outputs(80, [car_output()]), 0);
        assert_eq!(nav.process_frame(&frame(), 0).alerts().len(), 1);
        assert_eq!(nav.process_frame(&frame(), 300).outcome, FrameOutcome::Quiet);
    }

    #[test]
    fn empty_output_is_clear() {
        let mut nav = navigator(StubBackend::new(80), 0);
        let report = nav.process_frame(&frame(), 0);
        assert_eq!(report.outcome, FrameOutcome::Clear);
        assert_eq!(report.visible, 0);
    }

    #[test]
    fn counts_consecutive_inference_failures() {
        let mut stub = StubBackend::new(80);
        stub.push_failure("npu timeout");
        stub.push_failure("npu timeout");
        stub.push_output(car_output());
        let mut nav = navigator(stub, 0);

        let first = nav.process_frame(&frame(), 0);
        assert!(matches!(
            first.outcome,
            FrameOutcome::Failed(PipelineError::InferenceFailure(_))
        ));
        nav.process_frame(&frame(), 10);
        assert_eq!(nav.consecutive_failures(), 2);

        assert_eq!(nav.process_frame(&frame(), 20).alerts().len(), 1);
        assert_eq!(nav.consecutive_failures(), 0);
    }

    #[test]
    fn invalid_output_does_not_count_as_inference_failure() {
        let wrong_shape = RawOutputBuilder::new(3).candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9).build();
        let mut nav = navigator(StubBackend::with_outputs(80, [wrong_shape]), 0);
        let report = nav.process_frame(&frame(), 0);
        assert!(matches!(
            report.outcome,
            FrameOutcome::Failed(PipelineError::InvalidInput(_))
        ));
        assert_eq!(nav.consecutive_failures(), 0);
    }

    #[test]
    fn reset_allows_immediate_reannouncement() {
        let mut nav = navigator(StubBackend::with_outputs(80, [car_output()]), 250);
        assert_eq!(nav.process_frame(&frame(), 0).alerts().len(), 1);
        nav.reset();
        assert_eq!(nav.process_frame(&frame(), 1).alerts().len(), 1);
    }

    #[test]
    fn rejects_bad_settings() {
        let settings = NavigatorSettings {
            max_alerts: 0,
            ..Default::default()
        };
        let result = Navigator::new(
            Arc::new(CategoryTable::coco().unwrap()),
            settings,
            Box::new(StubBackend::new(80)),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
