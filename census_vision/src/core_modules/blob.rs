// THEORY:
// The `blob` module holds the "dumb" data containers of the spatial layer.
// A `BlobContour` is one connected foreground region found in a single frame:
// its boundary, its enclosed area and its bounding box. It knows nothing about
// earlier frames.
//
// `BoundingBoxKey` doubles as the only notion of identity the engine has. The
// cumulative census treats two contours with the exact same box as the same
// detection. That is an approximation of object identity, not tracking: an
// object that shifts by a single pixel produces a new key.

use crate::core_modules::classifier::Category;
use imageproc::point::Point;

/// Axis-aligned bounding box of a contour. Width and height count pixels
/// inclusively, so a single-pixel region is 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundingBoxKey {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBoxKey {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing every point. `None` for an empty point list.
    pub fn enclosing(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &points[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Some(Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }
}

/// The geometric descriptors the classifier decides on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDescriptor {
    pub area: f64,
    pub width: u32,
    pub height: u32,
}

/// One external boundary found in a cleaned mask.
#[derive(Debug, Clone)]
pub struct BlobContour {
    /// Boundary points in tracing order.
    pub points: Vec<Point<i32>>,
    /// Enclosed area of the boundary polygon, always non-negative.
    pub area: f64,
    pub bounding_box: BoundingBoxKey,
}

impl BlobContour {
    /// Builds a contour from traced boundary points. `None` when no points were traced.
    pub fn from_points(points: Vec<Point<i32>>) -> Option<Self> {
        let bounding_box = BoundingBoxKey::enclosing(&points)?;
        let area = polygon_area(&points);
        Some(Self {
            points,
            area,
            bounding_box,
        })
    }

    pub fn shape(&self) -> ShapeDescriptor {
        ShapeDescriptor {
            area: self.area,
            width: self.bounding_box.width,
            height: self.bounding_box.height,
        }
    }
}

/// Shoelace area of a closed polygon through pixel centres.
///
/// A filled `w x h` rectangle traced along its border pixels encloses
/// `(w - 1) * (h - 1)`.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, current) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        twice_area += current.x as i64 * next.y as i64 - next.x as i64 * current.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// A classified contour as reported for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub category: Category,
    pub bounding_box: BoundingBoxKey,
    pub area: f64,
    /// Whether this detection incremented the census on this frame.
    pub newly_counted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle_border(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Point<i32>> {
        let mut points = Vec::new();
        for x in x0..=x1 {
            points.push(Point::new(x, y0));
        }
        for y in y0 + 1..=y1 {
            points.push(Point::new(x1, y));
        }
        for x in (x0..x1).rev() {
            points.push(Point::new(x, y1));
        }
        for y in (y0 + 1..y1).rev() {
            points.push(Point::new(x0, y));
        }
        points
    }

    #[test]
    fn bounding_box_counts_pixels_inclusively() {
        let key = BoundingBoxKey::enclosing(&rectangle_border(10, 20, 29, 59)).unwrap();
        assert_eq!(key, BoundingBoxKey::new(10, 20, 20, 40));
    }

    #[test]
    fn single_point_is_one_by_one() {
        let key = BoundingBoxKey::enclosing(&[Point::new(4, 7)]).unwrap();
        assert_eq!(key, BoundingBoxKey::new(4, 7, 1, 1));
        assert!(BoundingBoxKey::enclosing(&[]).is_none());
    }

    #[test]
    fn shoelace_area_ignores_winding() {
        let border = rectangle_border(0, 0, 20, 40);
        let mut reversed = border.clone();
        reversed.reverse();
        assert_eq!(polygon_area(&border), 800.0);
        assert_eq!(polygon_area(&reversed), 800.0);
    }

    #[test]
    fn lines_enclose_nothing() {
        let line: Vec<_> = (0..10).map(|x| Point::new(x, 3)).collect();
        assert_eq!(polygon_area(&line), 0.0);
        assert_eq!(polygon_area(&line[..2]), 0.0);
    }

    #[test]
    fn contour_shape_uses_box_dimensions() {
        let contour = BlobContour::from_points(rectangle_border(5, 5, 24, 44)).unwrap();
        let shape = contour.shape();
        assert_eq!((shape.width, shape.height), (20, 40));
        assert_eq!(shape.area, 19.0 * 39.0);
    }
}
