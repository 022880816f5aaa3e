use anyhow::Result;

use crate::detect::tensor::RawOutput;
use crate::preprocess::InputTensor;

/// Inference runtime adapter.
///
/// Maps a preprocessed input tensor to the detector's raw output. The runtime
/// is opaque to the pipeline: the adapter reports the output's layout and box
/// units and the decoder takes it from there. Errors are reported per frame
/// as inference failures; the pipeline keeps running.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one input.
    ///
    /// Implementations must not retain the input beyond the call.
    fn infer(&mut self, input: &InputTensor) -> Result<RawOutput>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
