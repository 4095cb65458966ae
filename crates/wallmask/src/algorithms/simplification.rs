use tracing::{debug, warn};

use crate::{
    config::SimplificationConfig,
    error::ContourError,
    traits::ContourSimplifier,
    types::{ClosedContour, ContourOutcome, Point, SimplifiedContour, SkippedContour},
};

/// Greedy single-pass simplifier.
///
/// Each interior point is tested against the last *accepted* point and the
/// next input point. It is kept when it lies further than
/// `distance_threshold` from the last accepted point, or when the three
/// points are not nearly collinear (twice the triangle area reaches
/// `collinearity_threshold`). The first and last points are always kept.
#[derive(Debug, Clone)]
pub struct CollinearitySimplifier {
    pub distance_threshold: f64,
    pub collinearity_threshold: f64,
}

impl Default for CollinearitySimplifier {
    fn default() -> Self {
        Self::from(&SimplificationConfig::default())
    }
}

impl From<&SimplificationConfig> for CollinearitySimplifier {
    fn from(config: &SimplificationConfig) -> Self {
        Self {
            distance_threshold: config.distance_threshold,
            collinearity_threshold: config.collinearity_threshold,
        }
    }
}

fn distance(a: Point, b: Point) -> f64 {
    let dx = (b[0] as f64) - (a[0] as f64);
    let dy = (b[1] as f64) - (a[1] as f64);
    dx.hypot(dy)
}

/// Twice the signed area of the triangle `prev, curr, next`.
fn twice_signed_area(prev: Point, curr: Point, next: Point) -> Result<i64, ContourError> {
    let d = |a: i32, b: i32| (a as i64) - (b as i64);
    let lhs = d(curr[0], prev[0]).checked_mul(d(next[1], prev[1]));
    let rhs = d(next[0], prev[0]).checked_mul(d(curr[1], prev[1]));
    lhs.zip(rhs)
        .and_then(|(l, r)| l.checked_sub(r))
        .ok_or_else(|| {
            ContourError::MalformedGeometry(format!(
                "triangle area overflows for {prev:?}, {curr:?}, {next:?}"
            ))
        })
}

impl ContourSimplifier for CollinearitySimplifier {
    fn simplify(&self, contour: &ClosedContour) -> Result<SimplifiedContour, ContourError> {
        let points = &contour.points;
        if points.len() < 3 {
            return Err(ContourError::TooFewPoints(points.len()));
        }

        let mut simplified = Vec::with_capacity(points.len());
        simplified.push(points[0]);

        for window in points.windows(2).skip(1) {
            let (curr, next) = (window[0], window[1]);
            let prev = simplified[simplified.len() - 1];

            let far = distance(prev, curr) > self.distance_threshold;
            let bends = twice_signed_area(prev, curr, next)?.unsigned_abs() as f64 >= self.collinearity_threshold;
            if far || bends {
                simplified.push(curr);
            }
        }

        simplified.push(points[points.len() - 1]);

        if simplified.len() <= 2 {
            return Err(ContourError::Degenerate(simplified.len()));
        }
        Ok(SimplifiedContour { points: simplified })
    }
}

/// Simplify every contour independently; a failing contour is logged and
/// reported as skipped without affecting the others.
pub fn simplify_contours(
    simplifier: &dyn ContourSimplifier,
    contours: &[ClosedContour],
) -> Vec<ContourOutcome> {
    let outcomes: Vec<ContourOutcome> = contours
        .iter()
        .enumerate()
        .map(|(index, contour)| match simplifier.simplify(contour) {
            Ok(simplified) => ContourOutcome::Simplified(simplified),
            Err(reason) => {
                warn!(index, %reason, points = ?contour.points, "skipping contour");
                ContourOutcome::Skipped(SkippedContour {
                    index,
                    reason,
                    points: contour.points.clone(),
                })
            }
        })
        .collect();

    debug!(
        contours = contours.len(),
        skipped = outcomes.iter().filter(|o| o.is_skipped()).count(),
        "simplified contours"
    );
    outcomes
}
