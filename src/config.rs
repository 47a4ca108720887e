use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::detection::DetectorKind;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://plategate.db";

/// Runtime settings. Loaded from an optional JSON file; command-line flags
/// override individual fields afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_url: String,
    pub detector: DetectorKind,
    pub detector_model: Option<PathBuf>,
    pub detector_input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_contours: usize,
    /// Directory holding `text-detection.rten` and `text-recognition.rten`; `~/.cache/ocrs` when unset
    pub ocr_models_dir: Option<PathBuf>,
    pub allow_list_path: Option<PathBuf>,
    pub frames_dir: Option<PathBuf>,
    pub debug_out: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            detector: DetectorKind::Contour,
            detector_model: None,
            detector_input_size: 640,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_contours: 10,
            ocr_models_dir: None,
            allow_list_path: None,
            frames_dir: None,
            debug_out: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!("confidence_threshold must be within [0, 1], got {}", self.confidence_threshold);
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!("iou_threshold must be within [0, 1], got {}", self.iou_threshold);
        }
        if self.max_contours == 0 {
            anyhow::bail!("max_contours must be at least 1");
        }
        if self.detector_input_size == 0 {
            anyhow::bail!("detector_input_size must be at least 1");
        }
        Ok(())
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "plategate=debug" } else { "plategate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
