//! Local frame source.
//!
//! `FileSource` reads still images from a single file or a directory (sorted by
//! name), or synthesizes frames for `stub://` paths. URL schemes other than
//! `stub://` are rejected.

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::RgbFrame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image file, directory of images, or `stub://<name>`.
    pub path: String,
    /// Synthetic frame width.
    pub width: u32,
    /// Synthetic frame height.
    pub height: u32,
    /// Restart from the first image after the last one.
    pub looping: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            width: 640,
            height: 480,
            looping: true,
        }
    }
}

pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequence),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths or stub:// (got {:?})",
                config.path
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticSource::new(config))
        } else {
            FileBackend::Images(ImageSequence::open(config)?)
        };
        Ok(Self { backend })
    }

    pub fn connect(&mut self) -> Result<()> {
        match &self.backend {
            FileBackend::Synthetic(source) => {
                log::info!("FileSource: connected to {} (synthetic)", source.config.path);
            }
            FileBackend::Images(source) => {
                log::info!(
                    "FileSource: {} image(s) under {}",
                    source.paths.len(),
                    source.config.path
                );
            }
        }
        Ok(())
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<RgbFrame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame().map(Some),
            FileBackend::Images(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            FileBackend::Images(source) => source.last_error.is_none(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => SourceStats {
                frames_captured: source.frame_count,
                source: source.config.path.clone(),
            },
            FileBackend::Images(source) => SourceStats {
                frames_captured: source.frame_count,
                source: source.config.path.clone(),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Image files
// ----------------------------------------------------------------------------

struct ImageSequence {
    config: FileConfig,
    paths: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageSequence {
    fn open(config: FileConfig) -> Result<Self> {
        let root = Path::new(&config.path);
        let paths = if root.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(root)
                .with_context(|| format!("failed to list {}", root.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| has_image_extension(p))
                .collect();
            paths.sort();
            paths
        } else if root.is_file() {
            vec![root.to_path_buf()]
        } else {
            bail!("{} does not exist", root.display());
        };
        if paths.is_empty() {
            bail!("no images found under {}", root.display());
        }
        Ok(Self {
            config,
            paths,
            cursor: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    fn next_frame(&mut self) -> Result<Option<RgbFrame>> {
        if self.cursor == self.paths.len() {
            if !self.config.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.paths[self.cursor];
        self.cursor += 1;

        let decoded = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))
            .and_then(|img| Ok(RgbFrame::from_image(img)?));
        match decoded {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_error = None;
                Ok(Some(frame))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: FileConfig,
    frame_count: u64,
}

impl SyntheticSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    /// Low-amplitude sensor noise over a mid-gray background.
    fn next_frame(&mut self) -> Result<RgbFrame> {
        self.frame_count += 1;
        let len = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut rng = rand::thread_rng();
        let pixels: Vec<u8> = (0..len).map(|_| rng.gen_range(100u8..=156)).collect();
        Ok(RgbFrame::from_rgb(
            self.config.width,
            self.config.height,
            pixels,
        )?)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rejects_remote_urls() {
        let config = FileConfig {
            path: "rtsp://camera/stream".into(),
            ..Default::default()
        };
        assert!(FileSource::new(config).is_err());
    }

    #[test]
    fn synthetic_frames_have_configured_size() {
        let mut source = FileSource::new(FileConfig {
            path: "stub://street".into(),
            width: 32,
            height: 24,
            looping: true,
        })
        .unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[test]
    fn reads_a_directory_in_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        RgbImage::from_pixel(6, 2, Rgb([0, 0, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = FileSource::new(FileConfig {
            path: dir.path().to_string_lossy().into_owned(),
            looping: false,
            ..Default::default()
        })
        .unwrap();
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(&first.pixels()[..3], &[255, 0, 0]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.width(), 6);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.is_healthy());
    }

    #[test]
    fn loops_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only.png");
        RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])).save(&path).unwrap();

        let mut source = FileSource::new(FileConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        })
        .unwrap();
        for _ in 0..3 {
            assert!(source.next_frame().unwrap().is_some());
        }
        assert_eq!(source.stats().frames_captured, 3);
    }
}
