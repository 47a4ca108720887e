use image::DynamicImage;
use image::imageops::FilterType;
pub use ocrs::{OcrEngine, ImageSource};  // Re-export for use in other modules
use ocrs::OcrEngineParams;
use rten::Model;
use std::path::{Path, PathBuf};

const DETECTION_MODEL_FILE: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Reads the characters on a cropped plate image.
///
/// Implementations return an empty string when nothing legible is found; OCR
/// trouble on a single crop is never an error for the caller.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, region: &DynamicImage) -> String;
}

/// Default location of the ocrs models (`~/.cache/ocrs`)
pub fn default_models_dir() -> anyhow::Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))?;
    Ok(Path::new(&home_dir).join(".cache/ocrs"))
}

/// Initialize OCR engine with the detection and recognition models in `models_dir`
pub fn init_ocr_engine(models_dir: &Path) -> anyhow::Result<OcrEngine> {
    let detection_model_path = models_dir.join(DETECTION_MODEL_FILE);
    let recognition_model_path = models_dir.join(RECOGNITION_MODEL_FILE);

    // Check if models exist
    if !detection_model_path.exists() || !recognition_model_path.exists() {
        anyhow::bail!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        );
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })?;

    Ok(engine)
}

/// Plate reader backed by the ocrs engine, treating the crop as one word on one line.
pub struct OcrsExtractor {
    engine: OcrEngine,
    /// Crops shorter than this are upscaled before recognition
    pub min_height: u32,
}

impl OcrsExtractor {
    pub fn new(engine: OcrEngine) -> Self {
        Self {
            engine,
            min_height: 64,
        }
    }

    pub fn from_models_dir(models_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(init_ocr_engine(models_dir)?))
    }

    fn recognize(&self, region: &DynamicImage) -> anyhow::Result<String> {
        let prepared = preprocess_plate_for_ocr(region, self.min_height);
        let img = prepared.to_rgb8();
        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|_| anyhow::anyhow!("plate crop buffer does not match its dimensions"))?;
        let ocr_input = self.engine.prepare_input(img_source)?;
        let text = self.engine.get_text(&ocr_input)?;
        Ok(single_word(&text))
    }
}

impl TextExtractor for OcrsExtractor {
    fn extract(&self, region: &DynamicImage) -> String {
        if region.width() == 0 || region.height() == 0 {
            return String::new();
        }
        match self.recognize(region) {
            Ok(text) => {
                tracing::debug!(text = %text, "OCR finished");
                text
            }
            Err(e) => {
                tracing::warn!("OCR failed on plate crop: {:#}", e);
                String::new()
            }
        }
    }
}

/// Grayscale and upscale small crops so characters reach a readable height
pub fn preprocess_plate_for_ocr(region: &DynamicImage, min_height: u32) -> DynamicImage {
    let gray = DynamicImage::ImageLuma8(region.to_luma8());
    let (width, height) = (gray.width(), gray.height());
    if height == 0 || height >= min_height {
        return gray;
    }
    let scale = min_height as f32 / height as f32;
    let scaled_w = ((width as f32 * scale).round() as u32).max(1);
    gray.resize_exact(scaled_w, min_height, FilterType::CatmullRom)
}

/// Collapse recognized lines into one word: all whitespace removed
pub fn single_word(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
