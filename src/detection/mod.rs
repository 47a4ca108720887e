pub mod preprocessing;
pub mod contours;
pub mod classical;
pub mod learned;
pub mod ocr;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::{Frame, Region};

pub use classical::ContourPlateDetector;
pub use learned::ModelPlateDetector;
pub use ocr::{OcrsExtractor, TextExtractor};

/// Finds candidate plate regions in a frame.
///
/// Detection is a pure function of the frame and the detector's configuration.
/// Finding nothing is a normal outcome (empty vector), including for an empty frame.
pub trait PlateDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<Region>;

    /// Human-readable name for this detector (used in log output)
    fn name(&self) -> &str;
}

/// Detector strategy, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Contour,
    Learned,
}

/// Build the configured detector
pub fn build_detector(config: &Config) -> anyhow::Result<Box<dyn PlateDetector>> {
    let detector: Box<dyn PlateDetector> = match config.detector {
        DetectorKind::Contour => {
            Box::new(ContourPlateDetector::new().with_max_contours(config.max_contours))
        }
        DetectorKind::Learned => {
            let Some(model_path) = &config.detector_model else {
                anyhow::bail!("detector = \"learned\" requires detector_model to be set");
            };
            Box::new(
                ModelPlateDetector::load(model_path, config.detector_input_size)?
                    .with_thresholds(config.confidence_threshold, config.iou_threshold),
            )
        }
    };
    tracing::info!(detector = detector.name(), "plate detector ready");
    Ok(detector)
}

/// Build the OCR extractor from the configured model directory
pub fn build_extractor(config: &Config) -> anyhow::Result<Box<dyn TextExtractor>> {
    let models_dir = match &config.ocr_models_dir {
        Some(dir) => dir.clone(),
        None => ocr::default_models_dir()?,
    };
    Ok(Box::new(OcrsExtractor::from_models_dir(&models_dir)?))
}
