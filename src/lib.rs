//! Navigation cue engine (navcue)
//!
//! Turns per-frame object-detector output into a short, prioritized and
//! throttled list of spoken/haptic navigation cues for blind and low-vision
//! pedestrians.
//!
//! # Pipeline
//!
//! One pass per camera frame:
//!
//! 1. **Preprocess**: letterbox (or stretch) into the model canvas, normalize to `[0, 1]`.
//! 2. **Infer**: an [`InferenceBackend`] maps the input tensor to a raw output.
//! 3. **Decode**: geometry bounds, class-margin and confidence checks, inverse letterbox.
//! 4. **Suppress**: class-aware non-maximum suppression.
//! 5. **Categorize**: safety tier, minimum apparent size, priority order, top-K.
//! 6. **Schedule**: per-key cooldowns; keys that leave the view are forgotten.
//! 7. **Compose**: direction, distance and haptic pattern per alert.
//!
//! # Module Structure
//!
//! - `frame`, `preprocess`: input frames and model tensors
//! - `detect`: raw output, decoder, NMS, inference backends
//! - `category`: safety tier table and categorizer
//! - `alert`: scheduler, spatial describer, composer, haptics
//! - `pipeline`: frame gate, navigator, worker thread, sinks
//! - `ingest`: frame sources and camera buffer conversion
//! - `config`: daemon configuration

pub mod alert;
pub mod category;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod preprocess;

pub use alert::{Alert, CooldownKey, Direction, Distance, HapticPattern};
pub use category::{Category, CategoryTable};
pub use detect::{Detection, InferenceBackend, RawOutput, StubBackend};
pub use error::{PipelineError, PipelineResult};
pub use frame::RgbFrame;
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use pipeline::{
    AlertSink, ChannelSink, FrameOutcome, FrameReport, LogSink, Navigator, NavigatorSettings,
    WorkerHandle,
};
pub use preprocess::{LetterboxTransform, Preprocessor, ResizeMode};
