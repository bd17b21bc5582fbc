use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{arc_length, convex_hull};
use imageproc::point::Point;

/// Contours traced from fewer points than this are treated as noise
pub const MIN_CONTOUR_POINTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMetrics {
    pub circularity: f64,
    pub solidity: f64,
    pub contour_count: u32,
}

impl ContourMetrics {
    pub const NONE: ContourMetrics = ContourMetrics {
        circularity: 0.0,
        solidity: 0.0,
        contour_count: 0,
    };
}

/// Outer border of a connected edge region
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    /// 4π·area / perimeter², clamped to [0, 1]
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        (4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)).clamp(0.0, 1.0)
    }

    pub fn hull_area(&self) -> f64 {
        polygon_area(&convex_hull(self.points.as_slice()))
    }

    /// area / convex hull area
    pub fn solidity(&self) -> f64 {
        let hull_area = self.hull_area();
        if hull_area <= 0.0 {
            return 0.0;
        }
        (self.area() / hull_area).clamp(0.0, 1.0)
    }
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
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

/// Fraction of pixels set in a binary edge map
pub fn edge_density(edges: &GrayImage) -> f64 {
    let (width, height) = edges.dimensions();
    let total = width as u64 * height as u64;
    if total == 0 {
        return 0.0;
    }
    let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();
    edge_pixels as f64 / total as f64
}

/// Find outer contours in binary edge image
pub fn find_outer_contours(edges: &GrayImage, min_points: usize) -> Vec<Contour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.points.len() >= min_points)
        .map(|c| Contour { points: c.points })
        .collect()
}

/// Circularity and solidity of the largest contour, plus the number of contours found
pub fn contour_metrics(edges: &GrayImage) -> ContourMetrics {
    let contours = find_outer_contours(edges, MIN_CONTOUR_POINTS);

    let largest = contours
        .iter()
        .map(|c| (c, c.area()))
        .fold(None::<(&Contour, f64)>, |best, (c, area)| match best {
            Some((_, best_area)) if best_area >= area => best,
            _ => Some((c, area)),
        });

    match largest {
        Some((contour, _)) => ContourMetrics {
            circularity: contour.circularity(),
            solidity: contour.solidity(),
            contour_count: contours.len() as u32,
        },
        None => ContourMetrics::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;

    #[test]
    fn test_polygon_area_square() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn test_square_outline_metrics() {
        let mut edges = GrayImage::new(64, 64);
        draw_hollow_rect_mut(&mut edges, Rect::at(10, 10).of_size(40, 40), Luma([255u8]));

        let metrics = contour_metrics(&edges);
        assert_eq!(metrics.contour_count, 1);
        // π/4 for a square
        assert!((metrics.circularity - std::f64::consts::FRAC_PI_4).abs() < 0.02);
        assert!(metrics.solidity > 0.95);
    }

    #[test]
    fn test_circle_is_rounder_than_square() {
        let mut circle = GrayImage::new(64, 64);
        draw_hollow_circle_mut(&mut circle, (32, 32), 20, Luma([255u8]));
        let mut square = GrayImage::new(64, 64);
        draw_hollow_rect_mut(&mut square, Rect::at(12, 12).of_size(40, 40), Luma([255u8]));

        let circle_metrics = contour_metrics(&circle);
        let square_metrics = contour_metrics(&square);
        assert!(circle_metrics.circularity > square_metrics.circularity);
        assert!(circle_metrics.solidity > 0.9);
    }

    #[test]
    fn test_blank_edge_map() {
        let edges = GrayImage::new(32, 32);
        assert_eq!(edge_density(&edges), 0.0);
        assert_eq!(contour_metrics(&edges), ContourMetrics::NONE);
    }

    #[test]
    fn test_counts_separate_regions() {
        let mut edges = GrayImage::new(100, 50);
        draw_hollow_rect_mut(&mut edges, Rect::at(5, 5).of_size(30, 30), Luma([255u8]));
        draw_hollow_rect_mut(&mut edges, Rect::at(55, 5).of_size(30, 30), Luma([255u8]));
        assert_eq!(contour_metrics(&edges).contour_count, 2);
    }
}
