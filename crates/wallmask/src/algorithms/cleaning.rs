use std::cmp::{max, min};

use image::{GrayImage, Luma};
use imageproc::{
    distance_transform::Norm,
    drawing::draw_polygon_mut,
    morphology::{dilate, erode},
    point::Point as DrawPoint,
};
use tracing::debug;

use crate::{
    config::MaskCleaningConfig,
    error::Result,
    traits::MaskStage,
    types::{BoundingBox, Point, WALL, WallMask, closed_length, polygon_area},
    algorithms::extraction::find_external_contours,
};

// A square element of side `k` is anchored at `k / 2`, so it covers offsets
// `-(k / 2)..=(k - 1 - k / 2)`. Odd sides are a plain L-infinity ball; even
// sides are the ball of radius `k / 2 - 1` plus one extra step. Dilation
// mirrors the element and erosion does not, so a closing never shifts walls.

fn square_dilate(mask: &WallMask, kernel_size: u8) -> WallMask {
    let ball = dilate(mask, Norm::LInf, kernel_size.saturating_sub(1) / 2);
    if kernel_size % 2 == 0 { extend_by_one(&ball, 1, max) } else { ball }
}

fn square_erode(mask: &WallMask, kernel_size: u8) -> WallMask {
    let ball = erode(mask, Norm::LInf, kernel_size.saturating_sub(1) / 2);
    if kernel_size % 2 == 0 { extend_by_one(&ball, -1, min) } else { ball }
}

/// Combine each pixel with its three neighbours one `step` along both axes.
/// Neighbours outside the image are ignored.
fn extend_by_one(mask: &WallMask, step: i64, pick: fn(u8, u8) -> u8) -> WallMask {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let mut value = mask.get_pixel(x, y)[0];
        for (dx, dy) in [(step, 0), (0, step), (step, step)] {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if (0..width).contains(&nx) && (0..height).contains(&ny) {
                value = pick(value, mask.get_pixel(nx as u32, ny as u32)[0]);
            }
        }
        Luma([value])
    })
}

/// Dilate once, erode twice, dilate once.
///
/// Small specks vanish in the double erosion; the last dilation restores the
/// thickness surviving walls lost.
#[derive(Debug, Clone)]
pub struct MorphologicalSmoothing {
    pub kernel_size: u8,
}

impl Default for MorphologicalSmoothing {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

impl MaskStage for MorphologicalSmoothing {
    fn name(&self) -> &'static str {
        "morphological_smoothing"
    }

    fn apply(&self, mask: &WallMask) -> Result<WallMask> {
        let k = self.kernel_size;
        let mask = square_dilate(mask, k);
        let mask = square_erode(&mask, k);
        let mask = square_erode(&mask, k);
        Ok(square_dilate(&mask, k))
    }
}

/// Keeps regions that look like walls and repaints them filled.
///
/// Area is a hard gate. Past it, a region survives if its bounding box
/// aspect ratio lies strictly inside the window or its perimeter exceeds
/// `min_perimeter`.
#[derive(Debug, Clone)]
pub struct ContourShapeFilter {
    pub min_area: f64,
    pub min_perimeter: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
}

impl Default for ContourShapeFilter {
    fn default() -> Self {
        Self::from(&MaskCleaningConfig::default())
    }
}

impl From<&MaskCleaningConfig> for ContourShapeFilter {
    fn from(config: &MaskCleaningConfig) -> Self {
        Self {
            min_area: config.min_area,
            min_perimeter: config.min_perimeter,
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
        }
    }
}

impl ContourShapeFilter {
    /// Whether the region bounded by `contour` is kept.
    pub fn keeps(&self, contour: &[Point]) -> bool {
        if polygon_area(contour) <= self.min_area {
            return false;
        }
        let Some(bbox) = BoundingBox::of(contour) else {
            return false;
        };
        let aspect_ratio = bbox.aspect_ratio();
        let perimeter = closed_length(contour);

        (self.min_aspect_ratio < aspect_ratio && aspect_ratio < self.max_aspect_ratio)
            || perimeter > self.min_perimeter
    }
}

/// Paint the region bounded by `contour`, boundary included.
///
/// Only called for kept regions, which have positive area and therefore at
/// least three distinct points.
fn fill_region(mask: &mut GrayImage, contour: &[Point]) {
    let mut points: Vec<DrawPoint<i32>> = contour.iter().map(|&[x, y]| DrawPoint::new(x, y)).collect();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() >= 3 {
        draw_polygon_mut(mask, &points, Luma([WALL]));
    }
}

impl MaskStage for ContourShapeFilter {
    fn name(&self) -> &'static str {
        "contour_shape_filter"
    }

    fn apply(&self, mask: &WallMask) -> Result<WallMask> {
        let mut cleaned = GrayImage::new(mask.width(), mask.height());
        let contours = find_external_contours(mask);

        let mut kept = 0;
        for contour in &contours {
            if self.keeps(contour) {
                fill_region(&mut cleaned, contour);
                kept += 1;
            }
        }

        debug!(regions = contours.len(), kept, "filtered regions by shape");
        Ok(cleaned)
    }
}

/// Morphological closing with a large kernel to bridge gaps between wall fragments.
#[derive(Debug, Clone)]
pub struct GapClosing {
    pub kernel_size: u8,
}

impl Default for GapClosing {
    fn default() -> Self {
        Self { kernel_size: 20 }
    }
}

impl MaskStage for GapClosing {
    fn name(&self) -> &'static str {
        "gap_closing"
    }

    fn apply(&self, mask: &WallMask) -> Result<WallMask> {
        let dilated = square_dilate(mask, self.kernel_size);
        Ok(square_erode(&dilated, self.kernel_size))
    }
}

/// The standard three-stage cleaning sequence for `config`.
pub fn cleaning_stages(config: &MaskCleaningConfig) -> Vec<Box<dyn MaskStage>> {
    vec![
        Box::new(MorphologicalSmoothing {
            kernel_size: config.smoothing_kernel_size,
        }),
        Box::new(ContourShapeFilter::from(config)),
        Box::new(GapClosing {
            kernel_size: config.closing_kernel_size,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BACKGROUND;

    fn fill_rect(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([WALL]));
            }
        }
    }

    fn wall_count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] == WALL).count()
    }

    #[test]
    fn smoothing_removes_specks_and_keeps_walls() {
        let mut mask = GrayImage::new(120, 80);
        fill_rect(&mut mask, 20, 20, 60, 20);
        fill_rect(&mut mask, 100, 60, 3, 3);
        mask.put_pixel(5, 5, Luma([WALL]));

        let smoothed = MorphologicalSmoothing::default().apply(&mask).unwrap();
        assert_eq!(smoothed.get_pixel(101, 61)[0], BACKGROUND);
        assert_eq!(smoothed.get_pixel(5, 5)[0], BACKGROUND);
        assert_eq!(wall_count(&smoothed), 60 * 20);
        assert_eq!(smoothed.get_pixel(20, 20)[0], WALL);
        assert_eq!(smoothed.get_pixel(79, 39)[0], WALL);
    }

    #[test]
    fn compact_square_below_perimeter_is_dropped() {
        // area 9801 passes, aspect 1.0 and perimeter 396 both fail
        let mut mask = GrayImage::new(200, 200);
        fill_rect(&mut mask, 50, 50, 100, 100);

        let filtered = ContourShapeFilter::default().apply(&mask).unwrap();
        assert_eq!(wall_count(&filtered), 0);
    }

    #[test]
    fn large_compact_square_kept_by_perimeter() {
        let mut mask = GrayImage::new(200, 200);
        fill_rect(&mut mask, 20, 20, 150, 150);

        let filtered = ContourShapeFilter::default().apply(&mask).unwrap();
        assert_eq!(filtered, mask);
    }

    #[test]
    fn elongated_region_kept_small_region_dropped() {
        let mut mask = GrayImage::new(200, 100);
        fill_rect(&mut mask, 10, 10, 100, 20);
        // aspect 4 but area 39 * 9 = 351
        fill_rect(&mut mask, 10, 60, 40, 10);

        let filtered = ContourShapeFilter::default().apply(&mask).unwrap();
        assert_eq!(wall_count(&filtered), 100 * 20);
        assert_eq!(filtered.get_pixel(20, 65)[0], BACKGROUND);
    }

    #[test]
    fn aspect_window_is_exclusive() {
        let filter = ContourShapeFilter {
            min_area: 0.0,
            min_perimeter: f64::INFINITY,
            min_aspect_ratio: 2.0,
            max_aspect_ratio: 4.0,
        };
        // 40 x 20 pixels, aspect exactly 2
        assert!(!filter.keeps(&[[0, 0], [0, 19], [39, 19], [39, 0]]));
        // 60 x 20 pixels, aspect 3
        assert!(filter.keeps(&[[0, 0], [0, 19], [59, 19], [59, 0]]));
        // 80 x 20 pixels, aspect exactly 4
        assert!(!filter.keeps(&[[0, 0], [0, 19], [79, 19], [79, 0]]));
    }

    #[test]
    fn filled_regions_lose_their_holes() {
        let mut mask = GrayImage::new(120, 60);
        fill_rect(&mut mask, 10, 10, 100, 30);
        for y in 20..30 {
            for x in 30..90 {
                mask.put_pixel(x, y, Luma([BACKGROUND]));
            }
        }

        let filtered = ContourShapeFilter::default().apply(&mask).unwrap();
        assert_eq!(filtered.get_pixel(50, 25)[0], WALL);
        assert_eq!(wall_count(&filtered), 100 * 30);
    }

    #[test]
    fn shape_filter_is_idempotent() {
        let mut mask = GrayImage::new(300, 200);
        fill_rect(&mut mask, 10, 10, 200, 25);
        fill_rect(&mut mask, 240, 20, 30, 150);
        fill_rect(&mut mask, 50, 100, 20, 20);
        fill_rect(&mut mask, 100, 150, 5, 5);

        let filter = ContourShapeFilter::default();
        let once = filter.apply(&mask).unwrap();
        let twice = filter.apply(&once).unwrap();
        assert_eq!(once, twice);
        assert!(wall_count(&once) > 0);
    }

    #[test]
    fn regions_touching_the_image_edge_survive_the_filter() {
        // left, top, right, bottom; each 20 x 60 or 60 x 20, aspect 3
        let cases = [(0, 20, 20, 60), (30, 0, 60, 20), (100, 20, 20, 60), (30, 80, 60, 20)];
        for (x, y, w, h) in cases {
            let mut mask = GrayImage::new(120, 100);
            fill_rect(&mut mask, x, y, w, h);

            let filtered = ContourShapeFilter::default().apply(&mask).unwrap();
            assert_eq!(filtered, mask, "rect at ({x}, {y})");
        }
    }

    #[test]
    fn concave_and_diagonal_regions_fill_exactly() {
        let mut l_shape = GrayImage::new(300, 300);
        fill_rect(&mut l_shape, 20, 20, 200, 20);
        fill_rect(&mut l_shape, 20, 20, 20, 200);

        let mut staircase = GrayImage::new(300, 300);
        for y in 10..260 {
            for x in 10..=y {
                staircase.put_pixel(x, y, Luma([WALL]));
            }
        }

        let filter = ContourShapeFilter::default();
        for mask in [l_shape, staircase] {
            let once = filter.apply(&mask).unwrap();
            assert_eq!(once, mask);
            assert_eq!(filter.apply(&once).unwrap(), once);
        }
    }

    #[test]
    fn even_kernel_is_exactly_that_wide() {
        let mut mask = GrayImage::new(100, 100);
        mask.put_pixel(50, 50, Luma([WALL]));

        let dilated = square_dilate(&mask, 20);
        assert_eq!(wall_count(&dilated), 20 * 20);
        assert_eq!(dilated.get_pixel(40, 40)[0], WALL);
        assert_eq!(dilated.get_pixel(59, 59)[0], WALL);
        assert_eq!(dilated.get_pixel(39, 50)[0], BACKGROUND);
        assert_eq!(dilated.get_pixel(60, 50)[0], BACKGROUND);

        assert_eq!(square_erode(&dilated, 20), mask);
    }

    #[test]
    fn closing_bridges_gaps_narrower_than_the_kernel() {
        let with_gap = |gap: u32| {
            let mut mask = GrayImage::new(160, 60);
            fill_rect(&mut mask, 20, 20, 40, 10);
            fill_rect(&mut mask, 60 + gap, 20, 40, 10);
            mask
        };

        let bridged = GapClosing::default().apply(&with_gap(19)).unwrap();
        assert_eq!(find_external_contours(&bridged).len(), 1);

        let apart = GapClosing::default().apply(&with_gap(20)).unwrap();
        assert_eq!(find_external_contours(&apart).len(), 2);
    }

    #[test]
    fn closing_bridges_small_gaps() {
        let mut mask = GrayImage::new(120, 60);
        fill_rect(&mut mask, 20, 20, 30, 10);
        fill_rect(&mut mask, 56, 20, 34, 10);
        assert_eq!(find_external_contours(&mask).len(), 2);

        let closed = GapClosing::default().apply(&mask).unwrap();
        assert_eq!(closed.get_pixel(53, 25)[0], WALL);
        assert_eq!(find_external_contours(&closed).len(), 1);
    }

    #[test]
    fn stages_keep_dimensions_and_empty_stays_empty() {
        let mask = GrayImage::new(64, 48);
        for stage in cleaning_stages(&MaskCleaningConfig::default()) {
            let out = stage.apply(&mask).unwrap();
            assert_eq!(out.dimensions(), (64, 48), "{}", stage.name());
            assert_eq!(wall_count(&out), 0, "{}", stage.name());
        }
    }
}
