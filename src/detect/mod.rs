mod backend;
mod backends;
mod decoder;
mod nms;
mod result;
mod tensor;

pub use backend::InferenceBackend;
pub use backends::{StubBackend, StubResponse};
pub use decoder::{DecodeStats, Decoder, DecoderConfig};
pub use nms::{NmsConfig, Suppressor};
pub use result::{BoundingBox, Detection};
pub use tensor::{BoxUnits, RawOutput, RawOutputBuilder, TensorLayout, BOX_ATTRIBUTES};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
