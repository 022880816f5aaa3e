#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceBackend;
use crate::detect::tensor::{BoxUnits, RawOutput, TensorLayout, BOX_ATTRIBUTES};
use crate::preprocess::InputTensor;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Loads a local model file once. Box values of the exported head are in
/// model-canvas pixels; the output orientation is read from its shape.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    num_classes: usize,
    channels_first: bool,
}

impl TractBackend {
    /// Load an ONNX model expecting `[1, 3, size, size]` input.
    pub fn new<P: AsRef<Path>>(model_path: P, size: u32, num_classes: usize) -> Result<Self> {
        Self::with_layout(model_path, size, size, num_classes, true)
    }

    /// Load an ONNX model; `channels_first` selects NCHW over NHWC input.
    pub fn with_layout<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        num_classes: usize,
        channels_first: bool,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let shape = if channels_first {
            tvec!(1, 3, height as usize, width as usize)
        } else {
            tvec!(1, height as usize, width as usize, 3)
        };
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            num_classes,
            channels_first,
        })
    }

    fn build_input(&self, input: &InputTensor) -> Result<Tensor> {
        if input.width() != self.width || input.height() != self.height {
            return Err(anyhow!(
                "input size {}x{} does not match model input {}x{}",
                input.width(),
                input.height(),
                self.width,
                self.height
            ));
        }

        let data = input.data();
        let width = self.width as usize;
        let height = self.height as usize;
        let tensor = if self.channels_first {
            tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, channel, y, x)| {
                data[(y * width + x) * 3 + channel]
            })
            .into_tensor()
        } else {
            tract_ndarray::Array4::from_shape_vec((1, height, width, 3), data.to_vec())
                .context("input tensor has the wrong length")?
                .into_tensor()
        };
        Ok(tensor)
    }

    fn extract_output(&self, outputs: TVec<TValue>) -> Result<RawOutput> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let dims: Vec<usize> = view.shape().iter().copied().filter(|&d| d != 1).collect();
        let attributes = BOX_ATTRIBUTES + self.num_classes;

        let (candidates, layout) = match dims.as_slice() {
            [a, n] if *a == attributes => (*n, TensorLayout::AttributeMajor),
            [n, a] if *a == attributes => (*n, TensorLayout::CandidateMajor),
            [a] if *a == attributes => (1, TensorLayout::CandidateMajor),
            _ => {
                return Err(anyhow!(
                    "output shape {:?} does not carry {} attributes per candidate",
                    view.shape(),
                    attributes
                ))
            }
        };

        let data: Vec<f32> = view.iter().copied().collect();
        RawOutput::new(data, candidates, attributes, layout, BoxUnits::InputPixels)
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, input: &InputTensor) -> Result<RawOutput> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        self.extract_output(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = if self.channels_first {
            Tensor::zero::<f32>(&[1, 3, self.height as usize, self.width as usize])?
        } else {
            Tensor::zero::<f32>(&[1, self.height as usize, self.width as usize, 3])?
        };
        self.model
            .run(tvec!(zeros.into()))
            .context("ONNX warm-up run failed")?;
        Ok(())
    }
}
