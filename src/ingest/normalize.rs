//! Camera buffer conversion to packed RGB.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::frame::RgbFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb24,
    /// Y plane followed by interleaved U/V at half resolution.
    Nv12,
    /// Y plane followed by interleaved V/U (Android camera default).
    Nv21,
}

impl std::str::FromStr for PixelFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb24" | "rgb" => Ok(Self::Rgb24),
            "nv12" => Ok(Self::Nv12),
            "nv21" => Ok(Self::Nv21),
            other => Err(anyhow!("unknown pixel format {:?}", other)),
        }
    }
}

/// Convert a camera buffer into an [`RgbFrame`].
pub fn frame_from_buffer(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<RgbFrame> {
    let rgb = normalize_to_rgb(pixels, width, height, format)?;
    Ok(RgbFrame::from_rgb(width, height, rgb)?)
}

pub fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = (width as usize)
                .checked_mul(height as usize)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
            if pixels.len() != expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok(pixels.to_vec())
        }
        PixelFormat::Nv12 => semi_planar_to_rgb(pixels, width, height, false),
        PixelFormat::Nv21 => semi_planar_to_rgb(pixels, width, height, true),
    }
}

fn semi_planar_to_rgb(pixels: &[u8], width: u32, height: u32, vu_order: bool) -> Result<Vec<u8>> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!(
            "semi-planar frames need even dimensions, got {}x{}",
            width,
            height
        ));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("YUV frame dimensions overflow"))?;
    let expected = y_plane + y_plane / 2;
    if pixels.len() != expected {
        return Err(anyhow!(
            "YUV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let (u, v) = if vu_order {
                (pixels[uv_index + 1], pixels[uv_index])
            } else {
                (pixels[uv_index], pixels[uv_index + 1])
            };
            let u = u as f32 - 128.0;
            let v = v as f32 - 128.0;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(y + 1.402 * v);
            rgb[offset + 1] = clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v);
            rgb[offset + 2] = clamp_to_u8(y + 1.772 * u);
        }
    }
    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
