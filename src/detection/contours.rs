use image::GrayImage;
use imageproc::contours::find_contours as trace_borders;
use imageproc::point::Point;
use crate::models::Contour;

/// Trace every border in a binary edge image
pub fn find_contours(edges: &GrayImage) -> Vec<Contour> {
    trace_borders::<i32>(edges)
        .into_iter()
        .filter(|c| c.points.len() >= 3)
        .map(|c| Contour::new(c.points))
        .collect()
}

/// Keep the `max_count` contours enclosing the largest area, largest first.
/// Equal areas keep their tracing order.
pub fn largest_contours(mut contours: Vec<Contour>, max_count: usize) -> Vec<Contour> {
    contours.sort_by(|a, b| b.area().total_cmp(&a.area()));
    contours.truncate(max_count);
    contours
}

/// First contour (in the given order) whose polygon approximation has exactly four vertices
pub fn find_quadrilateral(contours: &[Contour], epsilon_ratio: f64) -> Option<Vec<Point<i32>>> {
    contours
        .iter()
        .map(|c| c.approximate_polygon(epsilon_ratio))
        .find(|polygon| polygon.len() == 4)
}
