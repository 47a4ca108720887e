use crate::detection::{contours, preprocessing, PlateDetector};
use crate::models::{bounds_of, Frame, Region};

pub const PLATE_LABEL: &str = "plate";

/// Finds a plate as the largest contour that approximates to a quadrilateral.
#[derive(Debug, Clone)]
pub struct ContourPlateDetector {
    pub smoothing_radius: u32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub gap_radius: u8,
    pub max_contours: usize,
    pub epsilon_ratio: f64,
}

impl ContourPlateDetector {
    pub fn new() -> Self {
        Self {
            smoothing_radius: 2,
            low_threshold: 30.0,
            high_threshold: 200.0,
            gap_radius: 1,
            max_contours: 10,
            epsilon_ratio: 0.02,
        }
    }

    pub fn with_max_contours(mut self, max_contours: usize) -> Self {
        self.max_contours = max_contours;
        self
    }
}

impl Default for ContourPlateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PlateDetector for ContourPlateDetector {
    fn detect(&self, frame: &Frame) -> Vec<Region> {
        if frame.is_empty() {
            return Vec::new();
        }

        let gray = preprocessing::to_grayscale(frame.image());
        let smoothed = preprocessing::smooth(&gray, self.smoothing_radius);
        let edges = preprocessing::detect_edges(&smoothed, self.low_threshold, self.high_threshold);
        let edges = preprocessing::close_gaps(&edges, self.gap_radius);

        let all_contours = contours::find_contours(&edges);
        let total = all_contours.len();
        let candidates = contours::largest_contours(all_contours, self.max_contours);

        let Some(quad) = contours::find_quadrilateral(&candidates, self.epsilon_ratio) else {
            tracing::debug!(contours = total, "no quadrilateral contour found");
            return Vec::new();
        };

        let Some((min_x, min_y, max_x, max_y)) = bounds_of(&quad) else {
            return Vec::new();
        };
        let x = min_x.max(0) as u32;
        let y = min_y.max(0) as u32;
        let width = (max_x - min_x + 1).max(0) as u32;
        let height = (max_y - min_y + 1).max(0) as u32;

        let region = Region::new(x, y, width, height, 1.0).with_label(PLATE_LABEL);
        match region.clamp_to(frame.width(), frame.height()) {
            Some(region) => {
                tracing::debug!(contours = total, ?region, "plate quadrilateral found");
                vec![region]
            }
            None => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "Contour Geometry"
    }
}
