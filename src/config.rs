use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alert::{CooldownKey, DirectionScheme, DistanceThresholds};
use crate::category::{load_table, CategoryTable, MAX_ALERTS_LIMIT};
use crate::detect::{DecoderConfig, NmsConfig};
use crate::pipeline::NavigatorSettings;
use crate::preprocess::ResizeMode;

const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_FPS: u32 = 15;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NavcueConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    categories_path: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    capture_fps: Option<u32>,
    looping: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    input_size: Option<u32>,
    resize_mode: Option<ResizeMode>,
    frame_interval_ms: Option<u64>,
    max_alerts: Option<usize>,
    cooldown_key: Option<CooldownKey>,
    direction_scheme: Option<DirectionScheme>,
    distance: Option<DistanceThresholds>,
    decoder: Option<DecoderConfig>,
    nms: Option<NmsConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    json: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Stub,
    Tract,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "tract" | "onnx" => Ok(Self::Tract),
            other => Err(anyhow!("unknown backend {:?} (expected stub or tract)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavcueConfig {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub categories_path: Option<PathBuf>,
    pub source: SourceSettings,
    pub navigator: NavigatorSettings,
    pub json_output: bool,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub path: String,
    pub width: u32,
    pub height: u32,
    /// Rate at which the daemon pulls frames; the frame gate thins them further.
    pub capture_fps: u32,
    pub looping: bool,
}

impl NavcueConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NAVCUE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: NavcueConfigFile) -> Result<Self> {
        let backend = match file.backend.as_deref() {
            Some(name) => name.parse()?,
            None => BackendKind::Stub,
        };
        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            path: source.path.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            capture_fps: source.capture_fps.unwrap_or(DEFAULT_CAPTURE_FPS),
            looping: source.looping.unwrap_or(true),
        };

        let defaults = NavigatorSettings::default();
        let p = file.pipeline.unwrap_or_default();
        let navigator = NavigatorSettings {
            input_size: p.input_size.unwrap_or(defaults.input_size),
            resize_mode: p.resize_mode.unwrap_or(defaults.resize_mode),
            frame_interval_ms: p.frame_interval_ms.unwrap_or(defaults.frame_interval_ms),
            max_alerts: p.max_alerts.unwrap_or(defaults.max_alerts),
            cooldown_key: p.cooldown_key.unwrap_or(defaults.cooldown_key),
            direction_scheme: p.direction_scheme.unwrap_or(defaults.direction_scheme),
            distance: p.distance.unwrap_or(defaults.distance),
            decoder: p.decoder.unwrap_or(defaults.decoder),
            nms: p.nms.unwrap_or(defaults.nms),
        };

        Ok(Self {
            backend,
            model_path: file.model_path,
            labels_path: file.labels_path,
            categories_path: file.categories_path,
            source,
            navigator,
            json_output: file.output.and_then(|o| o.json).unwrap_or(false),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("NAVCUE_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.parse()?;
            }
        }
        if let Ok(path) = std::env::var("NAVCUE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("NAVCUE_LABELS") {
            if !path.trim().is_empty() {
                self.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("NAVCUE_CATEGORIES") {
            if !path.trim().is_empty() {
                self.categories_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(source) = std::env::var("NAVCUE_SOURCE") {
            if !source.trim().is_empty() {
                self.source.path = source;
            }
        }
        if let Ok(interval) = std::env::var("NAVCUE_FRAME_INTERVAL_MS") {
            self.navigator.frame_interval_ms = interval.trim().parse().map_err(|_| {
                anyhow!("NAVCUE_FRAME_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(max) = std::env::var("NAVCUE_MAX_ALERTS") {
            self.navigator.max_alerts = max
                .trim()
                .parse()
                .map_err(|_| anyhow!("NAVCUE_MAX_ALERTS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.backend == BackendKind::Tract && self.model_path.is_none() {
            return Err(anyhow!("the tract backend requires model_path"));
        }
        if !(1..=MAX_ALERTS_LIMIT).contains(&self.navigator.max_alerts) {
            return Err(anyhow!(
                "max_alerts must be within 1..={}, got {}",
                MAX_ALERTS_LIMIT,
                self.navigator.max_alerts
            ));
        }
        if self.navigator.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }
        if self.source.path.trim().is_empty() {
            return Err(anyhow!("source path must not be empty"));
        }
        if self.source.capture_fps == 0 {
            return Err(anyhow!("capture_fps must be greater than zero"));
        }
        if self.labels_path.is_some() && self.categories_path.is_none() {
            return Err(anyhow!("a custom label list requires categories_path"));
        }
        self.navigator.decoder.validate()?;
        self.navigator.nms.validate()?;
        self.navigator.distance.validate()?;
        Ok(())
    }

    /// Build the category table: a TOML table over a label file, or the
    /// built-in COCO table.
    pub fn load_table(&self) -> Result<CategoryTable> {
        load_table(self.categories_path.as_deref(), self.labels_path.as_deref())
    }
}

fn read_config_file(path: &Path) -> Result<NavcueConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
