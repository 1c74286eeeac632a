use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::backends::{ReplaySource, StubSource};
use crate::detect::{DetectionSource, LabelTable, SourceRole, SourceSet, DEBRIS_CLASSES};
use crate::fusion::FusionConfig;
use crate::ingest::SourceConfig;
use crate::tagger::PickCategory;
use crate::transport::{SendPolicy, StreamConfig};

const DEFAULT_WEIGHT: f32 = 1.0;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_NMS_IOU: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
struct FusiondConfigFile {
    fusion: Option<FusionConfig>,
    stream: Option<StreamConfigFile>,
    pick: Option<PickConfigFile>,
    source: Option<SourceConfigFile>,
    detectors: Option<DetectorsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    addr: Option<String>,
    connect_timeout_ms: Option<u64>,
    send_timeout_ms: Option<u64>,
    policy: Option<SendPolicy>,
    reconnect_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PickConfigFile {
    classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorsConfigFile {
    general: Option<DetectorConfigFile>,
    trusted: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    kind: Option<DetectorKind>,
    path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    weight: Option<f32>,
    confidence: Option<f32>,
    iou: Option<f32>,
}

/// Which backend runs a detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Fixed synthetic scene, no model needed.
    #[default]
    Stub,
    /// Recorded detections from a JSON-lines file.
    Replay,
    /// YOLOv8 ONNX model (feature: backend-tract).
    Tract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    /// Replay file or ONNX model.
    pub path: Option<PathBuf>,
    /// Overrides the role's built-in label table.
    pub labels_path: Option<PathBuf>,
    pub weight: f32,
    pub confidence: f32,
    /// NMS threshold for model backends.
    pub iou: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            kind: DetectorKind::default(),
            path: None,
            labels_path: None,
            weight: DEFAULT_WEIGHT,
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_NMS_IOU,
        }
    }
}

impl DetectorSettings {
    fn from_file(file: Option<DetectorConfigFile>) -> Self {
        let file = file.unwrap_or_default();
        Self {
            kind: file.kind.unwrap_or_default(),
            path: file.path,
            labels_path: file.labels_path,
            weight: file.weight.unwrap_or(DEFAULT_WEIGHT),
            confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou: file.iou.unwrap_or(DEFAULT_NMS_IOU),
        }
    }
}

/// Resolved `fusiond` settings.
#[derive(Debug, Clone)]
pub struct FusiondConfig {
    pub fusion: FusionConfig,
    pub stream: StreamConfig,
    pub pick_classes: Vec<String>,
    pub source: SourceConfig,
    pub general: DetectorSettings,
    pub trusted: DetectorSettings,
}

impl FusiondConfig {
    /// Load from `path` (or `FUSION_CONFIG` when `None`), then apply env
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("FUSION_CONFIG").ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FusiondConfigFile) -> Self {
        let stream = file.stream.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let detectors = file.detectors.unwrap_or_default();
        let stream_defaults = StreamConfig::default();
        let source_defaults = SourceConfig::default();
        Self {
            fusion: file.fusion.unwrap_or_default(),
            stream: StreamConfig {
                addr: stream.addr.unwrap_or(stream_defaults.addr),
                connect_timeout: stream
                    .connect_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(stream_defaults.connect_timeout),
                send_timeout: stream
                    .send_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(stream_defaults.send_timeout),
                policy: stream.policy.unwrap_or(stream_defaults.policy),
                reconnect_backoff: stream
                    .reconnect_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(stream_defaults.reconnect_backoff),
            },
            pick_classes: file
                .pick
                .and_then(|pick| pick.classes)
                .unwrap_or_else(|| DEBRIS_CLASSES.iter().map(|c| c.to_string()).collect()),
            source: SourceConfig {
                url: source.url.unwrap_or(source_defaults.url),
                width: source.width.unwrap_or(source_defaults.width),
                height: source.height.unwrap_or(source_defaults.height),
                max_frames: source.max_frames,
            },
            general: DetectorSettings::from_file(detectors.general),
            trusted: DetectorSettings::from_file(detectors.trusted),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("FUSION_STREAM_ADDR") {
            if !addr.trim().is_empty() {
                self.stream.addr = addr;
            }
        }
        if let Ok(url) = std::env::var("FUSION_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(thr) = std::env::var("FUSION_IOU_THR") {
            self.fusion.iou_thr = thr
                .trim()
                .parse()
                .map_err(|_| anyhow!("FUSION_IOU_THR must be a number in [0, 1]"))?;
        }
        if let Ok(thr) = std::env::var("FUSION_SKIP_BOX_THR") {
            self.fusion.skip_box_thr = thr
                .trim()
                .parse()
                .map_err(|_| anyhow!("FUSION_SKIP_BOX_THR must be a number in [0, 1]"))?;
        }
        if let Ok(classes) = std::env::var("FUSION_PICK_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.pick_classes = parsed;
            }
        }
        if let Ok(policy) = std::env::var("FUSION_SEND_POLICY") {
            if !policy.trim().is_empty() {
                self.stream.policy = policy.parse()?;
            }
        }
        Ok(())
    }

    /// Check every setting. Also run after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        check_unit("fusion.iou_thr", self.fusion.iou_thr)?;
        check_unit("fusion.skip_box_thr", self.fusion.skip_box_thr)?;
        if self.stream.addr.trim().is_empty() {
            return Err(anyhow!("stream.addr must not be empty"));
        }
        if self.stream.send_timeout.is_zero() {
            return Err(anyhow!("stream.send_timeout_ms must be greater than zero"));
        }
        if self.stream.connect_timeout.is_zero() {
            return Err(anyhow!("stream.connect_timeout_ms must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source dimensions must be non-zero (got {}x{})",
                self.source.width,
                self.source.height
            ));
        }
        for (name, detector) in [("general", &self.general), ("trusted", &self.trusted)] {
            if !detector.weight.is_finite() || detector.weight <= 0.0 {
                return Err(anyhow!(
                    "detectors.{}.weight must be finite and > 0 (got {})",
                    name,
                    detector.weight
                ));
            }
            check_unit(&format!("detectors.{}.confidence", name), detector.confidence)?;
            check_unit(&format!("detectors.{}.iou", name), detector.iou)?;
            if detector.kind != DetectorKind::Stub && detector.path.is_none() {
                return Err(anyhow!(
                    "detectors.{}.path is required for {:?} detectors",
                    name,
                    detector.kind
                ));
            }
        }
        Ok(())
    }

    pub fn pick_category(&self) -> PickCategory {
        PickCategory::new(self.pick_classes.iter().cloned())
    }

    /// Build both detectors, general first (source id 0) then trusted.
    pub fn build_sources(&self) -> Result<SourceSet> {
        let mut set = SourceSet::new();
        for (role, settings) in [
            (SourceRole::General, &self.general),
            (SourceRole::Trusted, &self.trusted),
        ] {
            let source = build_detector(role, settings, &self.source)?;
            log::info!(
                "detector {} ({:?}, weight {})",
                source.name(),
                settings.kind,
                settings.weight
            );
            set.register_boxed(source, settings.weight)?;
        }
        Ok(set)
    }
}

fn build_detector(
    role: SourceRole,
    settings: &DetectorSettings,
    frames: &SourceConfig,
) -> Result<Box<dyn DetectionSource>> {
    let labels = match &settings.labels_path {
        Some(path) => Some(LabelTable::load(path)?),
        None => None,
    };
    let default_labels = || match role {
        SourceRole::General => LabelTable::coco(),
        SourceRole::Trusted => LabelTable::debris(),
    };
    let name = role.as_str();

    match settings.kind {
        DetectorKind::Stub => {
            if labels.is_some() {
                log::warn!("detectors.{}.labels_path is ignored by the stub detector", name);
            }
            let stub = match role {
                SourceRole::General => StubSource::general(),
                SourceRole::Trusted => StubSource::trusted(),
            };
            Ok(Box::new(stub))
        }
        DetectorKind::Replay => {
            let path = required_path(name, settings)?;
            let labels = labels.unwrap_or_else(default_labels);
            Ok(Box::new(ReplaySource::open(name, role, labels, path)?))
        }
        DetectorKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                let path = required_path(name, settings)?;
                let labels = labels.unwrap_or_else(default_labels);
                let source = crate::detect::backends::TractYoloSource::new(
                    name,
                    role,
                    labels,
                    path,
                    frames.width,
                    frames.height,
                )?
                .with_thresholds(settings.confidence, settings.iou);
                Ok(Box::new(source))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                let _ = (frames, labels, default_labels);
                Err(anyhow!(
                    "detectors.{} uses kind tract, which requires the backend-tract feature",
                    name
                ))
            }
        }
    }
}

fn required_path<'a>(name: &str, settings: &'a DetectorSettings) -> Result<&'a Path> {
    settings
        .path
        .as_deref()
        .ok_or_else(|| anyhow!("detectors.{}.path is required", name))
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be in [0, 1] (got {})", name, value));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<FusiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
