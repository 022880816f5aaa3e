//! Alert delivery.

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::alert::Alert;
use crate::error::PipelineError;

/// Receives the outcome of every processed frame, on the worker thread.
///
/// Implementations should return quickly; speech and vibration belong on
/// another thread (see [`ChannelSink`]).
pub trait AlertSink: Send {
    /// Alerts for one frame, highest priority first.
    fn on_alerts(&mut self, frame_id: u64, alerts: &[Alert]);

    /// The frame was processed and nothing is in view.
    fn on_clear(&mut self, _frame_id: u64) {}

    /// Objects are in view but every one of them is cooling down. Not a
    /// "path clear" signal.
    fn on_quiet(&mut self, _frame_id: u64, _visible: usize) {}

    /// The frame failed; its alerts are suppressed.
    fn on_failure(&mut self, _frame_id: u64, _error: &PipelineError, _consecutive_failures: u32) {}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    Alerts {
        frame_id: u64,
        alerts: Vec<Alert>,
    },
    Clear {
        frame_id: u64,
    },
    Quiet {
        frame_id: u64,
        visible: usize,
    },
    Failure {
        frame_id: u64,
        error: String,
        consecutive_failures: u32,
    },
}

/// Forwards frame outcomes to a presentation thread, preserving order.
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("alert receiver dropped; discarding event");
        }
    }
}

impl AlertSink for ChannelSink {
    fn on_alerts(&mut self, frame_id: u64, alerts: &[Alert]) {
        self.send(SinkEvent::Alerts {
            frame_id,
            alerts: alerts.to_vec(),
        });
    }

    fn on_clear(&mut self, frame_id: u64) {
        self.send(SinkEvent::Clear { frame_id });
    }

    fn on_quiet(&mut self, frame_id: u64, visible: usize) {
        self.send(SinkEvent::Quiet { frame_id, visible });
    }

    fn on_failure(&mut self, frame_id: u64, error: &PipelineError, consecutive_failures: u32) {
        self.send(SinkEvent::Failure {
            frame_id,
            error: error.to_string(),
            consecutive_failures,
        });
    }
}

/// Writes alerts to the log, or as JSON lines to stdout.
#[derive(Debug, Default)]
pub struct LogSink {
    json: bool,
}

impl LogSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Present one event. Also used by the daemon's presentation thread.
    pub fn present(&self, event: &SinkEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("failed to encode alert event: {}", e),
            }
            return;
        }
        match event {
            SinkEvent::Alerts { frame_id, alerts } => {
                for alert in alerts {
                    if alert.is_critical() {
                        log::warn!(
                            "frame {} [{:?}] {} (tier {}, conf {:.2})",
                            frame_id,
                            alert.haptic,
                            alert.utterance(),
                            alert.tier,
                            alert.confidence
                        );
                        continue;
                    }
                    log::info!(
                        "frame {} [{:?}] {} (tier {}, conf {:.2})",
                        frame_id,
                        alert.haptic,
                        alert.utterance(),
                        alert.tier,
                        alert.confidence
                    );
                }
            }
            SinkEvent::Clear { frame_id } => log::debug!("frame {} clear", frame_id),
            SinkEvent::Quiet { frame_id, visible } => {
                log::debug!("frame {} quiet, {} in view", frame_id, visible)
            }
            SinkEvent::Failure {
                frame_id,
                error,
                consecutive_failures,
            } => log::warn!(
                "frame {} failed ({} in a row): {}",
                frame_id,
                consecutive_failures,
                error
            ),
        }
    }
}

impl AlertSink for LogSink {
    fn on_alerts(&mut self, frame_id: u64, alerts: &[Alert]) {
        self.present(&SinkEvent::Alerts {
            frame_id,
            alerts: alerts.to_vec(),
        });
    }

    fn on_clear(&mut self, frame_id: u64) {
        self.present(&SinkEvent::Clear { frame_id });
    }

    fn on_quiet(&mut self, frame_id: u64, visible: usize) {
        self.present(&SinkEvent::Quiet { frame_id, visible });
    }

    fn on_failure(&mut self, frame_id: u64, error: &PipelineError, consecutive_failures: u32) {
        self.present(&SinkEvent::Failure {
            frame_id,
            error: error.to_string(),
            consecutive_failures,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Direction, Distance, HapticPattern};

    #[test]
    fn channel_sink_preserves_order() {
        let (mut sink, rx) = ChannelSink::new();
        let alert = Alert {
            label: "dog".into(),
            tier: 2,
            tier_name: "person or animal".into(),
            confidence: 0.8,
            direction: Direction::Right,
            distance: Distance::Nearby,
            haptic: HapticPattern::Warning,
        };
        sink.on_alerts(1, &[alert.clone()]);
        sink.on_clear(2);
        sink.on_quiet(3, 2);
        sink.on_failure(4, &PipelineError::InferenceFailure("boom".into()), 1);

        assert_eq!(
            rx.recv().unwrap(),
            SinkEvent::Alerts {
                frame_id: 1,
                alerts: vec![alert]
            }
        );
        assert_eq!(rx.recv().unwrap(), SinkEvent::Clear { frame_id: 2 });
        assert_eq!(
            rx.recv().unwrap(),
            SinkEvent::Quiet {
                frame_id: 3,
                visible: 2
            }
        );
        match rx.recv().unwrap() {
            SinkEvent::Failure {
                consecutive_failures,
                ..
            } => assert_eq!(consecutive_failures, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(SinkEvent::Clear { frame_id: 7 }).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["frame_id"], 7);

        let json = serde_json::to_value(SinkEvent::Quiet {
            frame_id: 8,
            visible: 1,
        })
        .unwrap();
        assert_eq!(json["event"], "quiet");
        assert_eq!(json["visible"], 1);
    }

    #[test]
    fn dropped_receiver_is_not_fatal() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_clear(1);
    }
}
