use std::sync::Arc;
use std::time::Duration;

use navcue::alert::SpatialDescriber;
use navcue::category::{Categorizer, COCO_LABELS};
use navcue::detect::{BoundingBox, RawOutputBuilder, Suppressor};
use navcue::pipeline::{self, ChannelSink, SinkEvent};
use navcue::{
    CategoryTable, Detection, Direction, Distance, FrameOutcome, HapticPattern,
    LetterboxTransform, Navigator, NavigatorSettings, PipelineError, RawOutput, RgbFrame,
    StubBackend,
};

const FRAME_W: u32 = 640;
const FRAME_H: u32 = 480;

fn class(label: &str) -> usize {
    COCO_LABELS
        .iter()
        .position(|l| *l == label)
        .unwrap_or_else(|| panic!("{} is not a COCO label", label))
}

fn coco() -> Arc<CategoryTable> {
    Arc::new(CategoryTable::coco().expect("built-in table"))
}

fn navigator_with(stub: StubBackend, frame_interval_ms: u64) -> Navigator {
    let settings = NavigatorSettings {
        frame_interval_ms,
        ..Default::default()
    };
    Navigator::new(coco(), settings, Box::new(stub)).expect("navigator")
}

fn navigator() -> Navigator {
    navigator_with(StubBackend::new(COCO_LABELS.len()), 0)
}

fn transform() -> LetterboxTransform {
    LetterboxTransform::identity(FRAME_W, FRAME_H)
}

fn output() -> RawOutputBuilder {
    RawOutputBuilder::new(COCO_LABELS.len())
}

fn empty() -> RawOutput {
    output().build()
}

fn close_car() -> RawOutput {
    output()
        .candidate(0.5, 0.5, 0.78, 0.78, class("car"), 0.9)
        .build()
}

/// Car in the middle of the model canvas; fits any 4:3 frame after letterboxing.
fn car_ahead() -> RawOutput {
    output()
        .candidate(0.5, 0.5, 0.4, 0.4, class("car"), 0.9)
        .build()
}

fn detection(label: &str, confidence: f32, left: f32, top: f32, right: f32, bottom: f32) -> Detection {
    Detection::new(
        label,
        class(label),
        confidence,
        BoundingBox::new(left, top, right, bottom),
        FRAME_W,
        FRAME_H,
    )
    .expect("valid detection")
}

// ----------------------------------------------------------------------------
// Reference scenarios
// ----------------------------------------------------------------------------

#[test]
fn close_car_is_announced_once_then_cools_down() {
    let mut nav = navigator();

    let report = nav.process_output(&close_car(), &transform(), 0);
    let alerts = report.alerts();
    assert_eq!(alerts.len(), 1);
    let car = &alerts[0];
    assert_eq!(car.label, "car");
    assert_eq!(car.tier, 3);
    assert_eq!(car.distance, Distance::VeryClose);
    assert_eq!(car.direction, Direction::Center);
    assert_eq!(car.haptic, HapticPattern::Warning);
    assert_eq!(car.utterance(), "car very close ahead");

    let repeat = nav.process_output(&close_car(), &transform(), 200);
    assert_eq!(repeat.outcome, FrameOutcome::Quiet);
    assert_eq!(repeat.visible, 1);
}

#[test]
fn overlapping_duplicates_keep_the_stronger_box() {
    let raw = output()
        .candidate(0.5, 0.5, 0.4, 0.4, class("car"), 0.8)
        .candidate(0.505, 0.5, 0.4, 0.4, class("car"), 0.6)
        .build();

    let mut nav = navigator();
    let report = nav.process_output(&raw, &transform(), 0);
    assert_eq!(report.visible, 1);
    let alerts = report.alerts();
    assert_eq!(alerts.len(), 1);
    assert!((alerts[0].confidence - 0.8).abs() < 1e-6);
}

#[test]
fn small_obstacle_is_dropped_by_the_size_gate() {
    // 0.2236^2 ~= 0.05 of the frame, well under the obstacle tier's 0.15.
    let raw = output()
        .candidate(0.5, 0.6, 0.2236, 0.2236, class("chair"), 0.8)
        .build();

    let mut nav = navigator();
    let report = nav.process_output(&raw, &transform(), 0);
    assert_eq!(report.outcome, FrameOutcome::Clear);
    assert_eq!(report.visible, 0);
}

#[test]
fn table_missing_a_detector_label_is_rejected_at_startup() {
    let labels: Vec<String> = ["person", "car", "dog"].iter().map(|l| l.to_string()).collect();
    let toml = r#"
        [[tiers]]
        tier = 1
        name = "living"
        confidence = 0.5
        cooldown_ms = 1000
        labels = ["person"]

        [[tiers]]
        tier = 2
        name = "vehicle"
        confidence = 0.5
        cooldown_ms = 1500
        labels = ["car"]
    "#;

    let err = CategoryTable::from_toml_str(toml, &labels).unwrap_err();
    match err {
        PipelineError::Configuration(msg) => assert!(msg.contains("dog"), "{}", msg),
        other => panic!("expected configuration error, got {:?}", other),
    }
}

// ----------------------------------------------------------------------------
// Scheduling over time
// ----------------------------------------------------------------------------

#[test]
fn object_in_continuous_view_is_repeated_after_its_cooldown() {
    let mut nav = navigator();
    assert_eq!(nav.process_output(&close_car(), &transform(), 0).alerts().len(), 1);
    assert_eq!(
        nav.process_output(&close_car(), &transform(), 1_000).outcome,
        FrameOutcome::Quiet
    );
    // Vehicle cooldown is 1600ms.
    assert_eq!(nav.process_output(&close_car(), &transform(), 1_700).alerts().len(), 1);
}

#[test]
fn object_that_leaves_view_is_announced_again_on_return() {
    let mut nav = navigator();
    assert_eq!(nav.process_output(&close_car(), &transform(), 0).alerts().len(), 1);
    assert_eq!(nav.process_output(&empty(), &transform(), 300).outcome, FrameOutcome::Clear);
    assert_eq!(nav.process_output(&close_car(), &transform(), 600).alerts().len(), 1);
}

#[test]
fn highest_tiers_win_the_alert_budget() {
    let raw = output()
        .candidate(0.75, 0.5, 0.3, 0.3, class("car"), 0.9)
        .candidate(0.5, 0.7, 0.2, 0.2, class("dog"), 0.8)
        .candidate(0.3, 0.5, 0.15, 0.5, class("person"), 0.9)
        .candidate(0.1, 0.3, 0.1, 0.15, class("stop sign"), 0.9)
        .build();

    let mut nav = navigator();
    let report = nav.process_output(&raw, &transform(), 0);
    assert_eq!(report.visible, 4);
    let labels: Vec<&str> = report.alerts().iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, ["stop sign", "person", "dog"]);
    assert_eq!(report.alerts()[0].haptic, HapticPattern::Urgent);
    assert_eq!(report.alerts()[0].direction, Direction::FarLeft);
}

#[test]
fn outranked_object_keeps_its_history() {
    let crowd = output()
        .candidate(0.75, 0.5, 0.3, 0.3, class("car"), 0.9)
        .candidate(0.5, 0.7, 0.2, 0.2, class("dog"), 0.8)
        .candidate(0.3, 0.5, 0.15, 0.5, class("person"), 0.9)
        .candidate(0.1, 0.3, 0.1, 0.15, class("stop sign"), 0.9)
        .build();

    let mut nav = navigator();
    nav.process_output(&close_car(), &transform(), 0);
    // The car is visible but outside the top three; it is not forgotten.
    nav.process_output(&crowd, &transform(), 300);
    let report = nav.process_output(&close_car(), &transform(), 600);
    assert_eq!(report.outcome, FrameOutcome::Quiet);
}

#[test]
fn frame_gate_drops_frames_arriving_too_soon() {
    let mut nav = navigator_with(StubBackend::new(COCO_LABELS.len()), 250);
    assert_eq!(nav.process_output(&close_car(), &transform(), 0).alerts().len(), 1);
    assert_eq!(
        nav.process_output(&close_car(), &transform(), 100).outcome,
        FrameOutcome::RateLimited
    );
    assert_eq!(
        nav.process_output(&close_car(), &transform(), 250).outcome,
        FrameOutcome::Quiet
    );
}

// ----------------------------------------------------------------------------
// Stage properties
// ----------------------------------------------------------------------------

#[test]
fn suppression_is_idempotent() {
    let detections = vec![
        detection("car", 0.9, 100.0, 100.0, 300.0, 300.0),
        detection("car", 0.7, 110.0, 105.0, 305.0, 300.0),
        detection("person", 0.8, 120.0, 90.0, 200.0, 320.0),
        detection("dog", 0.6, 400.0, 300.0, 500.0, 400.0),
    ];
    let suppressor = Suppressor::default();
    let once = suppressor.suppress(detections);
    let twice = suppressor.suppress(once.clone());
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn describer_is_deterministic() {
    let describer = SpatialDescriber::default();
    let det = detection("bench", 0.7, 20.0, 200.0, 180.0, 460.0);
    let first = describer.describe(&det, FRAME_W);
    for _ in 0..10 {
        assert_eq!(describer.describe(&det, FRAME_W), first);
    }
    assert_eq!(first.direction, Direction::FarLeft);
}

#[test]
fn categorizer_output_is_sorted_by_tier() {
    let categorizer = Categorizer::new(coco(), 10).expect("categorizer");
    let frame = categorizer.categorize(vec![
        detection("car", 0.9, 300.0, 100.0, 500.0, 300.0),
        detection("knife", 0.9, 10.0, 10.0, 40.0, 40.0),
        detection("person", 0.9, 100.0, 50.0, 200.0, 400.0),
    ]);
    let tiers: Vec<u8> = frame.ranked().iter().map(|r| r.category.tier).collect();
    assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "{:?}", tiers);
    assert_eq!(tiers.first(), Some(&1));
}

// ----------------------------------------------------------------------------
// End to end
// ----------------------------------------------------------------------------

#[test]
fn camera_frame_flows_through_the_stub_backend() {
    let stub = StubBackend::with_outputs(COCO_LABELS.len(), [car_ahead()]);
    let mut nav = navigator_with(stub, 0);
    let frame = RgbFrame::from_rgb(FRAME_W, FRAME_H, vec![100u8; (FRAME_W * FRAME_H * 3) as usize])
        .expect("frame");

    let report = nav.process_frame(&frame, 0);
    assert_eq!(report.alerts().len(), 1);
    let car = &report.alerts()[0];
    assert_eq!(car.label, "car");
    assert_eq!(car.direction, Direction::Center);
    assert_eq!(car.distance, Distance::InTheDistance);
}

#[test]
fn demo_scene_announces_the_hazards_it_shows() {
    let mut nav = navigator_with(StubBackend::demo_scene(), 0);
    let frame = RgbFrame::from_rgb(FRAME_W, FRAME_H, vec![80u8; (FRAME_W * FRAME_H * 3) as usize])
        .expect("frame");

    let report = nav.process_frame(&frame, 0);
    let labels: Vec<&str> = report.alerts().iter().map(|a| a.label.as_str()).collect();
    assert!(labels.contains(&"person"), "{:?}", labels);
    assert!(labels.contains(&"car"), "{:?}", labels);
}

#[test]
fn worker_reports_alerts_and_failures_in_order() {
    let mut stub = StubBackend::new(COCO_LABELS.len());
    stub.push_output(car_ahead());
    stub.push_failure("accelerator reset");
    let nav = navigator_with(stub, 0);

    let (sink, events) = ChannelSink::new();
    let worker = pipeline::spawn(nav, Box::new(sink)).expect("worker");
    let frame = RgbFrame::from_rgb(64, 48, vec![100u8; 64 * 48 * 3]).expect("frame");

    worker.submit(frame.clone());
    assert!(worker.wait_idle(Duration::from_secs(5)));
    worker.submit(frame);
    assert!(worker.wait_idle(Duration::from_secs(5)));

    let stats = worker.stop();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.consecutive_failures, 1);

    let events: Vec<SinkEvent> = events.iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], SinkEvent::Alerts { alerts, .. } if alerts[0].label == "car"));
    assert!(matches!(
        &events[1],
        SinkEvent::Failure { consecutive_failures: 1, .. }
    ));
}
