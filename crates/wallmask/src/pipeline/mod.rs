pub mod builder;

use std::path::Path;

use image::RgbImage;
use tracing::{debug, info};

use crate::{
    algorithms::{BackgroundFilter, MaskBuilder, simplify_contours},
    config::WallExtractorConfig,
    error::{Result, WallMaskError},
    traits::{ContourExtractor, ContourSimplifier, DominantColorEstimator, MaskStage},
    types::{ClosedContour, ColorWindow, ContourOutcome, PipelineStage, WALL, WallMask, WallOutline},
};

/// Wall extraction pipeline: background filter, dominant color, color mask,
/// mask cleaning, contour extraction and per-contour simplification.
///
/// Holds configuration only, so one instance can process any number of
/// images, from several threads at once.
pub struct Pipeline {
    background_filter: BackgroundFilter,
    color_estimator: Box<dyn DominantColorEstimator>,
    mask_builder: MaskBuilder,
    mask_stages: Vec<Box<dyn MaskStage>>,
    contour_extractor: Box<dyn ContourExtractor>,
    simplifier: Box<dyn ContourSimplifier>,
}

/// Every intermediate product of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub population_size: usize,
    pub dominant_color: [f32; 3],
    pub color_window: ColorWindow,
    pub raw_mask: WallMask,
    pub cleaned_mask: WallMask,
    pub contours: Vec<ClosedContour>,
    pub outcomes: Vec<ContourOutcome>,
}

impl PipelineRun {
    pub fn into_outline(self) -> WallOutline {
        let (width, height) = self.cleaned_mask.dimensions();
        WallOutline::from_outcomes(self.outcomes, self.dominant_color, width, height)
    }
}

/// Decode any supported raster image into RGB.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

fn coverage(mask: &WallMask) -> f64 {
    let total = (mask.width() as usize) * (mask.height() as usize);
    if total == 0 {
        return 0.0;
    }
    mask.pixels().filter(|p| p[0] == WALL).count() as f64 / total as f64
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Validate `config` and build the standard pipeline from it
    pub fn from_config(config: &WallExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(builder::PipelineBuilder::from_config(config).build())
    }

    /// Create a new pipeline with the given components
    pub fn new(
        background_filter: BackgroundFilter,
        color_estimator: Box<dyn DominantColorEstimator>,
        mask_builder: MaskBuilder,
        mask_stages: Vec<Box<dyn MaskStage>>,
        contour_extractor: Box<dyn ContourExtractor>,
        simplifier: Box<dyn ContourSimplifier>,
    ) -> Self {
        Self {
            background_filter,
            color_estimator,
            mask_builder,
            mask_stages,
            contour_extractor,
            simplifier,
        }
    }

    /// Background filter plus color estimation. Fails when only background remains.
    pub fn dominant_color(&self, image: &RgbImage) -> Result<(usize, [f32; 3])> {
        let population = self.background_filter.filter(image);
        debug!(stage = %PipelineStage::BackgroundFilter, population = population.len(), "filtered background");

        if population.is_empty() {
            let total = (image.width() as usize) * (image.height() as usize);
            return Err(WallMaskError::EmptyPixelPopulation(total));
        }

        let color = self.color_estimator.estimate(&population)?;
        debug!(stage = %PipelineStage::ColorEstimation, ?color, "dominant color");
        Ok((population.len(), color))
    }

    /// Run every mask stage in order.
    pub fn clean_mask(&self, mask: &WallMask) -> Result<WallMask> {
        let mut cleaned = mask.clone();
        for stage in &self.mask_stages {
            let next = stage.apply(&cleaned)?;
            if next.dimensions() != cleaned.dimensions() {
                return Err(WallMaskError::ImageProcessing(format!(
                    "{} changed mask size from {:?} to {:?}",
                    stage.name(),
                    cleaned.dimensions(),
                    next.dimensions()
                )));
            }
            debug!(stage = stage.name(), coverage = coverage(&next), "mask stage done");
            cleaned = next;
        }
        Ok(cleaned)
    }

    pub fn extract_contours(&self, mask: &WallMask) -> Result<Vec<ClosedContour>> {
        self.contour_extractor.extract_contours(mask)
    }

    /// Per-contour simplification; never fails as a whole.
    pub fn simplify(&self, contours: &[ClosedContour]) -> Vec<ContourOutcome> {
        simplify_contours(self.simplifier.as_ref(), contours)
    }

    /// Run the full pipeline, keeping every intermediate.
    pub fn run(&self, image: &RgbImage) -> Result<PipelineRun> {
        let (population_size, dominant_color) = self.dominant_color(image)?;

        let color_window = self.mask_builder.window(dominant_color);
        let raw_mask = self.mask_builder.build(image, dominant_color);
        debug!(
            stage = %PipelineStage::MaskBuilding,
            lower = ?color_window.lower,
            upper = ?color_window.upper,
            coverage = coverage(&raw_mask),
            "built wall mask"
        );

        let cleaned_mask = self.clean_mask(&raw_mask)?;
        debug!(stage = %PipelineStage::MaskCleaning, coverage = coverage(&cleaned_mask), "cleaned wall mask");

        let contours = self.extract_contours(&cleaned_mask)?;
        debug!(stage = %PipelineStage::ContourExtraction, contours = contours.len(), "extracted contours");

        let outcomes = self.simplify(&contours);
        let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
        debug!(stage = %PipelineStage::ContourSimplification, skipped, "simplified contours");

        info!(
            width = image.width(),
            height = image.height(),
            contours = contours.len(),
            walls = outcomes.len() - skipped,
            skipped,
            "wall extraction finished"
        );

        Ok(PipelineRun {
            population_size,
            dominant_color,
            color_window,
            raw_mask,
            cleaned_mask,
            contours,
            outcomes,
        })
    }

    /// Process an RGB image into simplified wall polygons
    pub fn process(&self, image: &RgbImage) -> Result<WallOutline> {
        Ok(self.run(image)?.into_outline())
    }

    /// Decode an image file and process it
    pub fn process_path<P: AsRef<Path>>(&self, path: P) -> Result<WallOutline> {
        let image = load_rgb(path)?;
        self.process(&image)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let stages: Vec<&str> = self.mask_stages.iter().map(|s| s.name()).collect();
        format!(
            "Pipeline: background threshold {}, color window -{}/+{}, mask stages [{}]",
            self.background_filter.threshold,
            self.mask_builder.lower_delta,
            self.mask_builder.upper_delta,
            stages.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ContourError, types::SimplifiedContour};
    use image::Rgb;

    const WALL_COLOR: Rgb<u8> = Rgb([70, 70, 80]);

    fn floor_plan() -> RgbImage {
        let mut image = RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
        let mut paint = |x0: u32, y0: u32, w: u32, h: u32| {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    image.put_pixel(x, y, WALL_COLOR);
                }
            }
        };
        // outer walls of a room
        paint(40, 40, 300, 12);
        paint(40, 40, 12, 200);
        paint(328, 40, 12, 200);
        paint(40, 228, 300, 12);
        // noise
        paint(370, 10, 2, 2);
        image
    }

    #[test]
    fn room_walls_become_one_polygon() {
        let pipeline = Pipeline::builder().build();
        let outline = pipeline.process(&floor_plan()).expect("Should process successfully");

        assert_eq!(outline.image_width, 400);
        assert_eq!(outline.image_height, 300);
        assert_eq!(outline.contours.len(), 1);
        assert!(outline.skipped.is_empty());

        let wall = &outline.contours[0];
        assert!(wall.len() >= 4);
        assert_eq!(wall.points.first(), wall.points.last());
        let bbox = wall.bounding_box().unwrap();
        assert!(bbox.x <= 40 && bbox.y <= 40);
        assert!(bbox.x + bbox.width >= 340 && bbox.y + bbox.height >= 240);
        for c in outline.dominant_color.iter().zip(WALL_COLOR.0) {
            assert!((c.0 - c.1 as f32).abs() < 1.0);
        }
    }

    #[test]
    fn run_exposes_intermediates() {
        let pipeline = Pipeline::builder().build();
        let run = pipeline.run(&floor_plan()).unwrap();
        assert_eq!(run.raw_mask.dimensions(), (400, 300));
        assert_eq!(run.cleaned_mask.dimensions(), (400, 300));
        assert_eq!(run.raw_mask.get_pixel(371, 11)[0], WALL);
        assert_eq!(run.cleaned_mask.get_pixel(371, 11)[0], 0);
        assert_eq!(run.contours.len(), run.outcomes.len());
    }

    #[test]
    fn all_white_image_is_an_input_quality_error() {
        let image = RgbImage::from_pixel(50, 40, Rgb([240, 250, 255]));
        let result = Pipeline::builder().build().process(&image);
        assert!(matches!(result, Err(WallMaskError::EmptyPixelPopulation(2000))));
    }

    #[test]
    fn small_blob_only_gives_empty_outline() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        for y in 40..50 {
            for x in 40..50 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let outline = Pipeline::builder().build().process(&image).unwrap();
        assert!(outline.contours.is_empty());
        assert!(outline.skipped.is_empty());
    }

    #[test]
    fn empty_mask_yields_empty_lists() {
        let pipeline = Pipeline::builder().build();
        let mask = WallMask::new(64, 64);
        let cleaned = pipeline.clean_mask(&mask).unwrap();
        let contours = pipeline.extract_contours(&cleaned).unwrap();
        assert!(contours.is_empty());
        assert!(pipeline.simplify(&contours).is_empty());
    }

    struct FixedColor([f32; 3]);

    impl DominantColorEstimator for FixedColor {
        fn estimate(&self, _pixels: &[Rgb<u8>]) -> Result<[f32; 3]> {
            Ok(self.0)
        }
    }

    struct RejectSmall;

    impl ContourSimplifier for RejectSmall {
        fn simplify(&self, contour: &ClosedContour) -> std::result::Result<SimplifiedContour, ContourError> {
            if contour.area() < 1000.0 {
                return Err(ContourError::MalformedGeometry("too small".into()));
            }
            Ok(SimplifiedContour { points: contour.points.clone() })
        }
    }

    #[test]
    fn custom_components_and_partial_failure() {
        let mut image = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for y in 10..20 {
            for x in 10..190 {
                image.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        for y in 100..105 {
            for x in 10..30 {
                image.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }

        let pipeline = Pipeline::builder()
            .set_color_estimator(FixedColor([20.0, 20.0, 20.0]))
            .without_mask_cleaning()
            .set_simplifier(RejectSmall)
            .build();

        let outline = pipeline.process(&image).unwrap();
        assert_eq!(outline.contours.len(), 1);
        assert_eq!(outline.skipped.len(), 1);
        assert_eq!(outline.skipped[0].index, 1);
    }

    #[test]
    fn from_config_validates() {
        let mut config = WallExtractorConfig::default();
        config.cleaning.max_aspect_ratio = 1.0;
        assert!(matches!(Pipeline::from_config(&config), Err(WallMaskError::InvalidConfig(_))));
        assert!(Pipeline::from_config(&WallExtractorConfig::default()).is_ok());
    }

    #[test]
    fn info_lists_stages() {
        let info = Pipeline::builder().build().info();
        assert!(info.contains("morphological_smoothing"));
        assert!(info.contains("contour_shape_filter"));
        assert!(info.contains("gap_closing"));
    }
}
