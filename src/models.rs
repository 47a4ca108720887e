use std::sync::Arc;

use image::DynamicImage;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use serde::Serialize;

/// Closed border traced from an edge image.
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed area (shoelace formula over the border points).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        arc_length(&self.points, true)
    }

    /// Douglas-Peucker approximation with `epsilon = epsilon_ratio * perimeter`.
    /// Vertices closer than epsilon to their predecessor are merged, including
    /// across the closing edge.
    pub fn approximate_polygon(&self, epsilon_ratio: f64) -> Vec<Point<i32>> {
        if self.points.len() < 3 {
            return self.points.clone();
        }
        let epsilon = epsilon_ratio * self.perimeter();
        if epsilon <= 0.0 {
            return Vec::new();
        }
        let approx = approximate_polygon_dp(&self.points, epsilon, true);

        let mut merged: Vec<Point<i32>> = Vec::with_capacity(approx.len());
        for p in approx {
            if merged.last().is_some_and(|last| distance(last, &p) < epsilon) {
                continue;
            }
            merged.push(p);
        }
        while merged.len() > 1 && distance(&merged[0], &merged[merged.len() - 1]) < epsilon {
            merged.pop();
        }
        merged
    }

    /// Bounding rectangle as (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        bounds_of(&self.points)
    }
}

pub fn bounds_of(points: &[Point<i32>]) -> Option<(i32, i32, i32, i32)> {
    let first = points.first()?;
    Some(points.iter().fold(
        (first.x, first.y, first.x, first.y),
        |(min_x, min_y, max_x, max_y), p| (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y)),
    ))
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice_area.abs() as f64 / 2.0
}

fn distance(a: &Point<i32>, b: &Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// A single camera frame. Cloning shares the pixel buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Crop the frame to a region, clamped to the frame bounds.
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn crop(&self, region: &Region) -> Option<DynamicImage> {
        let clamped = region.clamp_to(self.width(), self.height())?;
        Some(
            self.image
                .crop_imm(clamped.x, clamped.y, clamped.width, clamped.height),
        )
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Candidate plate rectangle in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
    pub label: Option<String>,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersection over union with another region.
    pub fn iou(&self, other: &Region) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let intersection = (x2 - x1) as u64 * (y2 - y1) as u64;
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }

    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Region> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Region {
            width,
            height,
            ..self.clone()
        })
    }
}

/// Outcome of an access check, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessVerdict {
    pub plate: String,
    pub granted: bool,
}
