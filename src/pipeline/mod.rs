//! Frame-by-frame pipeline: gate, orchestration, worker thread and sinks.

mod gate;
mod navigator;
mod sink;
mod worker;

pub use gate::FrameGate;
pub use navigator::{
    FrameOutcome, FrameReport, FrameTimings, Navigator, NavigatorSettings,
    DEFAULT_FRAME_INTERVAL_MS,
};
pub use sink::{AlertSink, ChannelSink, LogSink, SinkEvent};
pub use worker::{spawn, WorkerHandle, WorkerStats};
