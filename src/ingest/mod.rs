//! Frame ingestion sources.
//!
//! Sources hand decoded [`RgbFrame`]s to the pipeline. Camera capture itself
//! lives outside this crate; raw camera buffers are converted with
//! [`frame_from_buffer`].

pub mod file;
mod normalize;

pub use file::{FileConfig, FileSource};
pub use normalize::{frame_from_buffer, normalize_to_rgb, PixelFormat};

use anyhow::Result;

use crate::frame::RgbFrame;

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource: Send {
    /// Next frame, or `None` once a finite source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbFrame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}
