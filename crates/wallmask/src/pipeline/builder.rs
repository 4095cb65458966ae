use crate::{
    algorithms::{
        BackgroundFilter, CollinearitySimplifier, ExternalContourExtractor, KMeansColorEstimator,
        MaskBuilder, cleaning_stages,
    },
    config::WallExtractorConfig,
    pipeline::Pipeline,
    traits::{ContourExtractor, ContourSimplifier, DominantColorEstimator, MaskStage},
};

/// Builder for creating wall extraction pipelines with a fluent API
pub struct PipelineBuilder {
    config: WallExtractorConfig,
    color_estimator: Option<Box<dyn DominantColorEstimator>>,
    mask_stages: Option<Vec<Box<dyn MaskStage>>>,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    simplifier: Option<Box<dyn ContourSimplifier>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default thresholds
    pub fn new() -> Self {
        Self::from_config(&WallExtractorConfig::default())
    }

    /// Start from the given configuration; unset components are derived from it
    pub fn from_config(config: &WallExtractorConfig) -> Self {
        Self {
            config: config.clone(),
            color_estimator: None,
            mask_stages: None,
            contour_extractor: None,
            simplifier: None,
        }
    }

    pub fn with_background_threshold(mut self, threshold: u8) -> Self {
        self.config.background_threshold = threshold;
        self
    }

    pub fn with_color_window(mut self, lower_delta: f32, upper_delta: f32) -> Self {
        self.config.color_window.lower_delta = lower_delta;
        self.config.color_window.upper_delta = upper_delta;
        self
    }

    /// Set the dominant color estimator (replaces k-means)
    pub fn set_color_estimator<E>(mut self, estimator: E) -> Self
    where
        E: DominantColorEstimator + 'static,
    {
        self.color_estimator = Some(Box::new(estimator));
        self
    }

    /// Add a mask stage. The first call replaces the standard cleaning sequence.
    pub fn add_mask_stage<S>(mut self, stage: S) -> Self
    where
        S: MaskStage + 'static,
    {
        self.mask_stages.get_or_insert_with(Vec::new).push(Box::new(stage));
        self
    }

    /// Use the raw color mask as is
    pub fn without_mask_cleaning(mut self) -> Self {
        self.mask_stages = Some(Vec::new());
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<C>(mut self, extractor: C) -> Self
    where
        C: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the contour simplifier (replaces any existing one)
    pub fn set_simplifier<S>(mut self, simplifier: S) -> Self
    where
        S: ContourSimplifier + 'static,
    {
        self.simplifier = Some(Box::new(simplifier));
        self
    }

    /// Tune the default simplifier
    pub fn with_simplification(mut self, distance_threshold: f64, collinearity_threshold: f64) -> Self {
        self.config.simplification.distance_threshold = distance_threshold;
        self.config.simplification.collinearity_threshold = collinearity_threshold;
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let config = self.config;

        let color_estimator = self
            .color_estimator
            .unwrap_or_else(|| Box::new(KMeansColorEstimator::from(&config.clustering)));
        let mask_stages = self
            .mask_stages
            .unwrap_or_else(|| cleaning_stages(&config.cleaning));
        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(ExternalContourExtractor));
        let simplifier = self
            .simplifier
            .unwrap_or_else(|| Box::new(CollinearitySimplifier::from(&config.simplification)));

        Pipeline::new(
            BackgroundFilter {
                threshold: config.background_threshold,
            },
            color_estimator,
            MaskBuilder::from(&config.color_window),
            mask_stages,
            contour_extractor,
            simplifier,
        )
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
