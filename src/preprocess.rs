//! Frame preprocessing: resize into the model canvas and normalize to `[0, 1]`.
//!
//! The tensor is row-major HWC (`[1][height][width][3]`). The transform used to
//! place the frame on the canvas travels with the tensor so the decoder can map
//! boxes back into original-frame pixels.

use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::RgbFrame;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Canvas fill used for letterbox padding (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Aspect-preserving scale, centered on a padded canvas.
    #[default]
    Letterbox,
    /// Independent horizontal/vertical scale to fill the canvas.
    Stretch,
}

/// Mapping between original-frame pixels and model-canvas pixels.
///
/// `canvas = original * scale + pad` on each axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LetterboxTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub input_width: u32,
    pub input_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl LetterboxTransform {
    /// Map a canvas x coordinate (pixels) back to the original frame.
    pub fn to_frame_x(&self, canvas_x: f32) -> f32 {
        (canvas_x - self.pad_x) / self.scale_x
    }

    /// Map a canvas y coordinate (pixels) back to the original frame.
    pub fn to_frame_y(&self, canvas_y: f32) -> f32 {
        (canvas_y - self.pad_y) / self.scale_y
    }

    /// Identity transform for tensors that were produced at frame resolution.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            input_width: width,
            input_height: height,
            frame_width: width,
            frame_height: height,
        }
    }
}

/// Normalized model input.
#[derive(Clone, Debug)]
pub struct InputTensor {
    data: Vec<f32>,
    transform: LetterboxTransform,
}

impl InputTensor {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.transform.input_width
    }

    pub fn height(&self) -> u32 {
        self.transform.input_height
    }

    /// `[batch, height, width, channels]`.
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height() as usize, self.width() as usize, 3]
    }

    pub fn transform(&self) -> &LetterboxTransform {
        &self.transform
    }
}

#[derive(Clone, Debug)]
pub struct Preprocessor {
    input_width: u32,
    input_height: u32,
    mode: ResizeMode,
}

impl Preprocessor {
    pub fn new(input_size: u32, mode: ResizeMode) -> PipelineResult<Self> {
        if input_size == 0 {
            return Err(PipelineError::configuration("model input size must be > 0"));
        }
        Ok(Self {
            input_width: input_size,
            input_height: input_size,
            mode,
        })
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    pub fn prepare(&self, frame: &RgbFrame) -> PipelineResult<InputTensor> {
        let (frame_w, frame_h) = (frame.width(), frame.height());
        if frame_w == 0 || frame_h == 0 {
            return Err(PipelineError::invalid_input("empty frame"));
        }

        let transform = self.transform_for(frame_w, frame_h);
        let new_w = ((frame_w as f32 * transform.scale_x).round() as u32).clamp(1, self.input_width);
        let new_h =
            ((frame_h as f32 * transform.scale_y).round() as u32).clamp(1, self.input_height);

        let resized = if new_w == frame_w && new_h == frame_h {
            frame.as_image().clone()
        } else {
            imageops::resize(frame.as_image(), new_w, new_h, FilterType::Triangle)
        };

        let in_w = self.input_width as usize;
        let mut data = vec![PAD_VALUE; in_w * self.input_height as usize * 3];
        let offset_x = transform.pad_x as usize;
        let offset_y = transform.pad_y as usize;
        let src = resized.as_raw();
        let src_w = new_w as usize;

        for y in 0..new_h as usize {
            let src_row = &src[y * src_w * 3..(y + 1) * src_w * 3];
            let dst_start = ((offset_y + y) * in_w + offset_x) * 3;
            let dst_row = &mut data[dst_start..dst_start + src_w * 3];
            for (dst, &value) in dst_row.iter_mut().zip(src_row) {
                *dst = value as f32 / 255.0;
            }
        }

        Ok(InputTensor { data, transform })
    }

    fn transform_for(&self, frame_w: u32, frame_h: u32) -> LetterboxTransform {
        let sx = self.input_width as f32 / frame_w as f32;
        let sy = self.input_height as f32 / frame_h as f32;
        match self.mode {
            ResizeMode::Stretch => LetterboxTransform {
                scale_x: sx,
                scale_y: sy,
                pad_x: 0.0,
                pad_y: 0.0,
                input_width: self.input_width,
                input_height: self.input_height,
                frame_width: frame_w,
                frame_height: frame_h,
            },
            ResizeMode::Letterbox => {
                let scale = sx.min(sy);
                let new_w = ((frame_w as f32 * scale).round() as u32).clamp(1, self.input_width);
                let new_h = ((frame_h as f32 * scale).round() as u32).clamp(1, self.input_height);
                LetterboxTransform {
                    scale_x: scale,
                    scale_y: scale,
                    pad_x: ((self.input_width - new_w) / 2) as f32,
                    pad_y: ((self.input_height - new_h) / 2) as f32,
                    input_width: self.input_width,
                    input_height: self.input_height,
                    frame_width: frame_w,
                    frame_height: frame_h,
                }
            }
        }
    }
}
