use std::path::Path;

use anyhow::Context;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::detection::classical::PLATE_LABEL;
use crate::detection::PlateDetector;
use crate::models::{Frame, Region};

/// Number of leading rows in the prediction tensor holding centre-x, centre-y, width, height.
const CXYWH_ROWS: usize = 4;
/// Letterbox fill value, matching what the detector was trained with.
const PAD_VALUE: f32 = 144.0 / 255.0;

/// Single-stage plate detector (YOLOv8 output layout: `[1, 4 + classes, anchors]`).
pub struct ModelPlateDetector {
    model: Model,
    input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    labels: Vec<String>,
}

impl std::fmt::Debug for ModelPlateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPlateDetector")
            .field("input_size", &self.input_size)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .field("labels", &self.labels)
            .finish()
    }
}

impl ModelPlateDetector {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            anyhow::bail!("Detector model not found at {}", model_path.display());
        }
        let model = Model::load_file(model_path)
            .with_context(|| format!("Failed to load detector model {}", model_path.display()))?;
        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            labels: vec![PLATE_LABEL.to_string()],
        })
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    /// Letterbox the frame into the square model input. Returns the tensor and the
    /// scale factor from frame to model pixels.
    fn preprocess(&self, frame: &Frame) -> (NdTensor<f32, 4>, f32) {
        let size = self.input_size as usize;
        let scale = (self.input_size as f32 / frame.width() as f32)
            .min(self.input_size as f32 / frame.height() as f32);
        let new_w = ((frame.width() as f32 * scale).round() as u32).clamp(1, self.input_size);
        let new_h = ((frame.height() as f32 * scale).round() as u32).clamp(1, self.input_size);
        let resized = frame
            .image()
            .resize_exact(new_w, new_h, FilterType::Triangle)
            .to_rgb8();

        let mut data = vec![PAD_VALUE; 3 * size * size];
        for (x, y, rgb) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                data[c * size * size + y * size + x] = rgb[c] as f32 / 255.0;
            }
        }
        (NdTensor::from_data([1, 3, size, size], data), scale)
    }

    fn infer(&self, input: NdTensor<f32, 4>) -> anyhow::Result<(Vec<f32>, usize, usize)> {
        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Detector output is not a 3-D f32 tensor"))?;
        let [_, rows, anchors] = output.shape();
        Ok((output.to_vec(), rows, anchors))
    }
}

impl PlateDetector for ModelPlateDetector {
    fn detect(&self, frame: &Frame) -> Vec<Region> {
        if frame.is_empty() {
            return Vec::new();
        }
        let (input, scale) = self.preprocess(frame);
        let (output, rows, anchors) = match self.infer(input) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("plate detector inference failed: {:#}", e);
                return Vec::new();
            }
        };

        let mut regions = decode_predictions(
            &output,
            rows,
            anchors,
            scale,
            self.confidence_threshold,
            &self.labels,
        );
        non_max_suppression(&mut regions, self.iou_threshold);
        let regions: Vec<Region> = regions
            .into_iter()
            .filter_map(|r| r.clamp_to(frame.width(), frame.height()))
            .collect();
        tracing::debug!(candidates = regions.len(), "learned detector finished");
        regions
    }

    fn name(&self) -> &str {
        "Learned Detector"
    }
}

/// Decode a `[4 + classes, anchors]` row-major prediction block into regions in frame
/// coordinates. Keeps boxes whose best class score is strictly above `threshold`.
pub fn decode_predictions(
    output: &[f32],
    rows: usize,
    anchors: usize,
    scale: f32,
    threshold: f32,
    labels: &[String],
) -> Vec<Region> {
    if rows <= CXYWH_ROWS || output.len() < rows * anchors || scale <= 0.0 {
        return Vec::new();
    }
    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    let mut regions = Vec::new();
    for anchor in 0..anchors {
        let (class_id, confidence) = (CXYWH_ROWS..rows)
            .map(|row| (row - CXYWH_ROWS, at(row, anchor)))
            .fold((0, f32::MIN), |best, x| if x.1 > best.1 { x } else { best });

        if confidence <= threshold {
            continue;
        }

        let cx = at(0, anchor) / scale;
        let cy = at(1, anchor) / scale;
        let w = at(2, anchor) / scale;
        let h = at(3, anchor) / scale;
        let x = (cx - w / 2.0).max(0.0);
        let y = (cy - h / 2.0).max(0.0);
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| PLATE_LABEL.to_string());
        regions.push(
            Region::new(
                x.round() as u32,
                y.round() as u32,
                w.round().max(1.0) as u32,
                h.round().max(1.0) as u32,
                confidence.min(1.0),
            )
            .with_label(label),
        );
    }
    regions
}

/// Sort by descending confidence (stable for equal scores) and drop every box that
/// overlaps an already kept box by more than `iou_threshold`.
pub fn non_max_suppression(regions: &mut Vec<Region>, iou_threshold: f32) {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..regions.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if regions[prev_index].iou(&regions[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            regions.swap(current_index, index);
            current_index += 1;
        }
    }
    regions.truncate(current_index);
}
