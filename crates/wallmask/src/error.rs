use thiserror::Error;

#[derive(Error, Debug)]
pub enum WallMaskError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// No pixel survived background filtering; holds the image pixel count.
    #[error("Empty pixel population: all {0} pixels are background, cannot estimate a wall color")]
    EmptyPixelPopulation(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GeoJSON outline: {0}")]
    InvalidGeoJson(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, WallMaskError>;

/// Reasons a single contour is dropped. Never fatal for the image.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContourError {
    #[error("contour has {0} points, at least 3 are needed to simplify")]
    TooFewPoints(usize),

    #[error("simplified contour kept only {0} points, cannot form a polygon")]
    Degenerate(usize),

    #[error("malformed contour geometry: {0}")]
    MalformedGeometry(String),
}
