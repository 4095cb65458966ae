use image::Rgb;
use crate::{
    error::{ContourError, Result},
    types::{ClosedContour, SimplifiedContour, WallMask},
};

/// Trait for estimating the representative wall color of a pixel population
pub trait DominantColorEstimator: Send + Sync {
    /// Return one RGB color for the population. Empty input is an error.
    fn estimate(&self, pixels: &[Rgb<u8>]) -> Result<[f32; 3]>;
}

/// Trait for one mask cleaning stage (morphology, region filtering, ...)
pub trait MaskStage: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce a new mask of the same dimensions
    fn apply(&self, mask: &WallMask) -> Result<WallMask>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract closed external contours from a binary mask
    fn extract_contours(&self, mask: &WallMask) -> Result<Vec<ClosedContour>>;
}

/// Trait for per-contour simplification algorithms
pub trait ContourSimplifier: Send + Sync {
    /// Simplify one contour, or explain why it has to be dropped
    fn simplify(&self, contour: &ClosedContour) -> std::result::Result<SimplifiedContour, ContourError>;
}
