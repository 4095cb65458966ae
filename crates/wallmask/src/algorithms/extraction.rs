use image::{GrayImage, imageops};
use imageproc::contours::{find_contours, BorderType};
use tracing::debug;

use crate::{
    error::Result,
    traits::ContourExtractor,
    types::{ClosedContour, Point, WallMask},
};

/// Outermost region boundaries of a mask, in raster discovery order
/// (top-to-bottom, left-to-right), each compressed to its direction changes.
///
/// Border following misreads regions that touch the image edge, so tracing
/// runs on a copy framed by one background pixel and coordinates are shifted
/// back afterwards.
pub fn find_external_contours(mask: &WallMask) -> Vec<Vec<Point>> {
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            let points: Vec<Point> = contour.points.iter().map(|p| [p.x - 1, p.y - 1]).collect();
            compress_chain(&points)
        })
        .collect()
}

/// Drop boundary points that continue in the same direction as the step into them.
///
/// The chain is treated as cyclic, so the last point is compared against the
/// first. The starting point is always kept.
pub fn compress_chain(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: Point, b: Point| [(b[0] - a[0]).signum(), (b[1] - a[1]).signum()];

    let mut compressed = Vec::with_capacity(n / 2 + 1);
    compressed.push(points[0]);
    for i in 1..n {
        let (prev, curr, next) = (points[i - 1], points[i], points[(i + 1) % n]);
        if step(prev, curr) != step(curr, next) {
            compressed.push(curr);
        }
    }
    compressed
}

/// Append the first point when the ends are more than one pixel apart.
pub fn close_contour(mut points: Vec<Point>) -> Vec<Point> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return points;
    };
    let dx = (first[0] - last[0]) as f64;
    let dy = (first[1] - last[1]) as f64;
    if dx.hypot(dy) > 1.0 {
        points.push(first);
    }
    points
}

/// External-boundary extractor built on imageproc's border following
#[derive(Debug, Clone, Default)]
pub struct ExternalContourExtractor;

impl ContourExtractor for ExternalContourExtractor {
    fn extract_contours(&self, mask: &WallMask) -> Result<Vec<ClosedContour>> {
        let contours: Vec<ClosedContour> = find_external_contours(mask)
            .into_iter()
            .map(|points| ClosedContour::new(close_contour(points)))
            .collect();

        debug!(contours = contours.len(), "extracted external contours");
        Ok(contours)
    }
}
