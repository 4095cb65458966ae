//! # Wall Mask Extraction Library
//!
//! Turns a raster floor plan into simplified, closed 2-D wall polygons ready
//! to be triangulated and extruded.
//!
//! ## Pipeline
//!
//! 1. **Background filter**: drop near-white page pixels
//! 2. **Dominant color**: estimate the wall color from what is left
//! 3. **Mask builder**: threshold the image in a window around that color
//! 4. **Mask cleaning**: smoothing morphology, wall-shape region filter, gap closing
//! 5. **Contour extraction**: closed external boundaries in raster order
//! 6. **Contour simplification**: drop near-duplicate and near-collinear points
//!
//! Every stage sits behind a trait, so any of them can be swapped through
//! [`PipelineBuilder`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wallmask::Pipeline;
//!
//! // Create a pipeline with default thresholds
//! let pipeline = Pipeline::builder().build();
//!
//! // Process a floor plan
//! let outline = pipeline.process_path("plan.png")?;
//! for wall in &outline.contours {
//!     println!("{} points, area {:.0}", wall.len(), wall.area());
//! }
//!
//! // Export to GeoJSON
//! outline.save_geojson("plan.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use wallmask::{Pipeline, algorithms::*};
//!
//! let pipeline = Pipeline::builder()
//!     .with_background_threshold(200)
//!     .add_mask_stage(MorphologicalSmoothing { kernel_size: 3 })
//!     .add_mask_stage(GapClosing { kernel_size: 11 })
//!     .with_simplification(10.0, 8.0)
//!     .build();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use error::{ContourError, Result, WallMaskError};
pub use types::{
    ClosedContour, ColorWindow, ContourOutcome, PipelineStage, SimplifiedContour, SkippedContour,
    WallMask, WallOutline,
};
pub use config::WallExtractorConfig;
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{Pipeline, PipelineRun, builder::PipelineBuilder, load_rgb};

/// Extract simplified wall polygons from an RGB floor plan with default settings.
pub fn extract_walls(image: &image::RgbImage) -> Result<Vec<SimplifiedContour>> {
    Ok(Pipeline::builder().build().process(image)?.contours)
}
