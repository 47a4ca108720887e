use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use image::DynamicImage;

use crate::detection::{PlateDetector, TextExtractor};
use crate::models::{Frame, Region};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory receiving one PNG per selected plate crop
    pub output_dir: PathBuf,
}

/// Frame → best region → plate text.
pub struct RecognitionPipeline {
    detector: Box<dyn PlateDetector>,
    extractor: Box<dyn TextExtractor>,
    debug: Option<DebugConfig>,
    frames_seen: AtomicU64,
}

impl RecognitionPipeline {
    pub fn new(detector: Box<dyn PlateDetector>, extractor: Box<dyn TextExtractor>) -> Self {
        Self {
            detector,
            extractor,
            debug: None,
            frames_seen: AtomicU64::new(0),
        }
    }

    /// Save every selected plate crop into `output_dir`
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create debug directory {:?}", output_dir))?;
        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Recognize the plate in one frame.
    ///
    /// `None` means no candidate region was found. `Some("")` means a region was
    /// found but nothing on it was legible.
    pub fn process(&self, frame: &Frame) -> Option<String> {
        let frame_no = self.frames_seen.fetch_add(1, Ordering::Relaxed) + 1;

        let regions = self.detector.detect(frame);
        let Some(region) = select_region(&regions) else {
            tracing::debug!(frame = frame_no, "no plate candidate");
            return None;
        };
        let crop = frame.crop(region)?;

        self.save_debug_crop(frame_no, &crop);

        let text = self.extractor.extract(&crop);
        tracing::debug!(
            frame = frame_no,
            candidates = regions.len(),
            confidence = region.confidence,
            text = %text,
            "plate recognized"
        );
        Some(text)
    }

    fn save_debug_crop(&self, frame_no: u64, crop: &DynamicImage) {
        let Some(debug) = &self.debug else {
            return;
        };
        let path = debug.output_dir.join(format!("frame-{:06}.png", frame_no));
        if let Err(e) = crop.save(&path) {
            tracing::warn!("Failed to save debug crop {:?}: {}", path, e);
        }
    }
}

/// The most confident region; on equal confidence the first one wins.
pub fn select_region(regions: &[Region]) -> Option<&Region> {
    regions.iter().fold(None, |best: Option<&Region>, region| match best {
        Some(b) if region.confidence <= b.confidence => Some(b),
        _ => Some(region),
    })
}
