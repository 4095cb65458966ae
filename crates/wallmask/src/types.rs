use geo_types::{Coord, LineString, Polygon};
use image::{GrayImage, Rgb};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::error::ContourError;

/// Binary wall mask: 255 marks wall, 0 marks everything else.
pub type WallMask = GrayImage;

/// Integer pixel coordinate `[x, y]`.
pub type Point = [i32; 2];

pub const WALL: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Stages of the wall extraction pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    BackgroundFilter,
    ColorEstimation,
    MaskBuilding,
    MaskCleaning,
    ContourExtraction,
    ContourSimplification,
}

/// Inclusive RGB range around a dominant color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorWindow {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

impl ColorWindow {
    /// `lower = color - lower_delta`, `upper = color + upper_delta`, both clamped to `[0, 255]`.
    pub fn around(color: [f32; 3], lower_delta: f32, upper_delta: f32) -> Self {
        let clamp = |v: f32| v.clamp(0.0, 255.0);
        Self {
            lower: color.map(|c| clamp(c - lower_delta)),
            upper: color.map(|c| clamp(c + upper_delta)),
        }
    }

    pub fn contains(&self, pixel: &Rgb<u8>) -> bool {
        pixel.0.iter().enumerate().all(|(i, &c)| {
            let c = c as f32;
            c >= self.lower[i] && c <= self.upper[i]
        })
    }
}

/// Axis-aligned pixel bounding box; `width`/`height` count pixels inclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
        for &[x, y] in &points[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    /// `max(w, h) / min(w, h)`
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        w.max(h) / w.min(h)
    }
}

/// Convert a pixel polyline into a geo polygon; the ring is closed implicitly.
pub fn to_geo_polygon(points: &[Point]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Shoelace area of the polygon described by `points`.
pub fn polygon_area(points: &[Point]) -> f64 {
    use geo::Area;
    if points.len() < 3 {
        return 0.0;
    }
    to_geo_polygon(points).unsigned_area()
}

/// Length of the polyline including the closing segment back to the first point.
pub fn closed_length(points: &[Point]) -> f64 {
    use geo::EuclideanLength;
    if points.len() < 2 {
        return 0.0;
    }
    to_geo_polygon(points).exterior().euclidean_length()
}

/// External region boundary, guaranteed to end where it starts (within one pixel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedContour {
    pub points: Vec<Point>,
}

impl ClosedContour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        closed_length(&self.points)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.points)
    }
}

/// Wall footprint polygon handed to the meshing step. Always at least 3 points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedContour {
    pub points: Vec<Point>,
}

impl SimplifiedContour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        to_geo_polygon(&self.points)
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        closed_length(&self.points)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.points)
    }
}

/// A contour that was dropped during simplification, with the data that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedContour {
    /// Position of the contour in extraction order
    pub index: usize,
    pub reason: ContourError,
    pub points: Vec<Point>,
}

/// Per-contour result of the simplification stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ContourOutcome {
    Simplified(SimplifiedContour),
    Skipped(SkippedContour),
}

impl ContourOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Final result for one image.
#[derive(Debug, Clone, Serialize)]
pub struct WallOutline {
    /// Simplified closed wall polygons, in extraction order
    pub contours: Vec<SimplifiedContour>,
    /// Contours dropped during simplification
    #[serde(skip)]
    pub skipped: Vec<SkippedContour>,
    pub dominant_color: [f32; 3],
    pub image_width: u32,
    pub image_height: u32,
}

impl WallOutline {
    pub fn from_outcomes(
        outcomes: Vec<ContourOutcome>,
        dominant_color: [f32; 3],
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let mut contours = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                ContourOutcome::Simplified(contour) => contours.push(contour),
                ContourOutcome::Skipped(skip) => skipped.push(skip),
            }
        }
        Self {
            contours,
            skipped,
            dominant_color,
            image_width,
            image_height,
        }
    }

    pub fn total_points(&self) -> usize {
        self.contours.iter().map(SimplifiedContour::len).sum()
    }
}
