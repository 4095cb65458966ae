use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WallMaskError};

/// Complete, immutable configuration of the wall extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct WallExtractorConfig {
    /// Pixels with every channel at or above this value are page background
    #[schemars(range(min = 1, max = 255))]
    pub background_threshold: u8,
    pub color_window: ColorWindowConfig,
    pub clustering: ClusteringConfig,
    pub cleaning: MaskCleaningConfig,
    pub simplification: SimplificationConfig,
}

impl Default for WallExtractorConfig {
    fn default() -> Self {
        Self {
            background_threshold: 220,
            color_window: ColorWindowConfig::default(),
            clustering: ClusteringConfig::default(),
            cleaning: MaskCleaningConfig::default(),
            simplification: SimplificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ColorWindowConfig {
    /// Subtracted from the dominant color for the lower bound
    pub lower_delta: f32,
    /// Added to the dominant color for the upper bound (walls render lighter)
    pub upper_delta: f32,
}

impl Default for ColorWindowConfig {
    fn default() -> Self {
        Self {
            lower_delta: 10.0,
            upper_delta: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ClusteringConfig {
    #[schemars(range(min = 1))]
    pub clusters: usize,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this
    pub tolerance: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MaskCleaningConfig {
    /// Square structuring element for dilate/erode/erode/dilate smoothing
    #[schemars(range(min = 1))]
    pub smoothing_kernel_size: u8,
    /// Regions with area at or below this are always dropped
    pub min_area: f64,
    pub min_perimeter: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Square structuring element for the fragment-joining closing
    #[schemars(range(min = 1))]
    pub closing_kernel_size: u8,
}

impl Default for MaskCleaningConfig {
    fn default() -> Self {
        Self {
            smoothing_kernel_size: 5,
            min_area: 750.0,
            min_perimeter: 500.0,
            min_aspect_ratio: 1.5,
            max_aspect_ratio: 20.0,
            closing_kernel_size: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SimplificationConfig {
    pub distance_threshold: f64,
    pub collinearity_threshold: f64,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 25.0,
            collinearity_threshold: 15.0,
        }
    }
}

impl WallExtractorConfig {
    /// Get the JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(WallExtractorConfig)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(WallMaskError::InvalidConfig(msg)) };

        if self.background_threshold == 0 {
            return invalid("background_threshold must be positive".into());
        }
        if self.clustering.clusters == 0 {
            return invalid("clustering.clusters must be at least 1".into());
        }
        if !(self.clustering.tolerance >= 0.0) {
            return invalid(format!("clustering.tolerance must be >= 0, got {}", self.clustering.tolerance));
        }
        if !(self.color_window.lower_delta >= 0.0 && self.color_window.upper_delta >= 0.0) {
            return invalid("color_window deltas must be >= 0".into());
        }

        let cleaning = &self.cleaning;
        if cleaning.smoothing_kernel_size == 0 || cleaning.closing_kernel_size == 0 {
            return invalid("kernel sizes must be at least 1".into());
        }
        if !(cleaning.min_area >= 0.0 && cleaning.min_perimeter >= 0.0) {
            return invalid("min_area and min_perimeter must be >= 0".into());
        }
        if !(cleaning.min_aspect_ratio < cleaning.max_aspect_ratio) {
            return invalid(format!(
                "aspect window is empty: min_aspect_ratio {} >= max_aspect_ratio {}",
                cleaning.min_aspect_ratio, cleaning.max_aspect_ratio
            ));
        }

        let simplification = &self.simplification;
        // infinity is allowed for the distance threshold, NaN is not
        if !(simplification.distance_threshold >= 0.0 && simplification.collinearity_threshold >= 0.0) {
            return invalid("simplification thresholds must be >= 0".into());
        }

        Ok(())
    }
}
