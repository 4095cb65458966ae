use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info};
use wallmask::{Pipeline, WallExtractorConfig, WallMaskError, load_rgb};

#[derive(Error, Debug)]
pub enum WallmaskCliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    WallMask(#[from] WallMaskError),
    #[error("Input directory {0} does not exist")]
    MissingInputDir(PathBuf),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_workers() -> usize {
    4
}

/// Batch run over a directory of floor plans
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// File extensions (case-insensitive) treated as floor plan images
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Images processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Also write the cleaned wall mask as `<stem>_mask.png`
    #[serde(default)]
    pub save_masks: bool,
    #[serde(default)]
    pub extractor: WallExtractorConfig,
}

/// Where the results for one image go
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub geojson: PathBuf,
    pub mask: PathBuf,
}

impl BatchConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_dir: P, output_dir: Q) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            extensions: default_extensions(),
            workers: default_workers(),
            save_masks: false,
            extractor: WallExtractorConfig::default(),
        }
    }

    /// Load BatchConfig from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, WallmaskCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load BatchConfig from TOML string
    pub fn from_toml(content: &str) -> Result<Self, WallmaskCliError> {
        let config: BatchConfig = toml::from_str(content)?;
        config.extractor.validate()?;
        Ok(config)
    }

    /// Load BatchConfig from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, WallmaskCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load BatchConfig from JSON string
    pub fn from_json(content: &str) -> Result<Self, WallmaskCliError> {
        let config: BatchConfig = serde_json::from_str(content)?;
        config.extractor.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WallmaskCliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(WallmaskCliError::UnsupportedFileFormat),
        }
    }

    /// Convert BatchConfig to TOML string
    pub fn to_toml(&self) -> Result<String, WallmaskCliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert BatchConfig to JSON string
    pub fn to_json(&self) -> Result<String, WallmaskCliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Save BatchConfig, format chosen by extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WallmaskCliError> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(WallmaskCliError::UnsupportedFileFormat),
        };
        fs::write(path_ref, content)?;
        Ok(())
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Image files in `input_dir`, sorted by path
    pub fn collect_images(&self) -> Result<Vec<PathBuf>, WallmaskCliError> {
        if !self.input_dir.is_dir() {
            return Err(WallmaskCliError::MissingInputDir(self.input_dir.clone()));
        }
        let mut images = Vec::new();
        for entry in fs::read_dir(&self.input_dir)? {
            let path = entry?.path();
            if path.is_file() && self.accepts(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }

    pub fn output_paths(&self, image_path: &Path) -> OutputPaths {
        output_paths(&self.output_dir, image_path)
    }
}

pub fn output_paths(output_dir: &Path, image_path: &Path) -> OutputPaths {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    OutputPaths {
        geojson: output_dir.join(format!("{stem}.geojson")),
        mask: output_dir.join(format!("{stem}_mask.png")),
    }
}

/// Run the pipeline on one image file and write its outputs. Returns the wall count.
pub fn process_image(
    pipeline: &Pipeline,
    image_path: &Path,
    outputs: &OutputPaths,
    save_mask: bool,
) -> Result<usize, WallmaskCliError> {
    let image = load_rgb(image_path)?;
    let run = pipeline.run(&image)?;
    let cleaned_mask = save_mask.then(|| run.cleaned_mask.clone());

    let outline = run.into_outline();
    outline.save_geojson(&outputs.geojson)?;
    debug!(path = %outputs.geojson.display(), "saved wall outline");

    if let Some(mask) = cleaned_mask {
        // an image either produces all of its outputs or none
        if let Err(e) = mask.save(&outputs.mask) {
            let _ = fs::remove_file(&outputs.geojson);
            return Err(e.into());
        }
        debug!(path = %outputs.mask.display(), "saved wall mask");
    }

    Ok(outline.contours.len())
}

/// What a batch task hands back: the image it worked on and its wall count.
pub type ImageTaskOutput = (PathBuf, Result<usize, WallmaskCliError>);

/// Running totals of a batch. A failed or aborted image counts as failed and
/// never stops the batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub walls: usize,
}

impl BatchSummary {
    pub fn record(&mut self, joined: Result<ImageTaskOutput, JoinError>) {
        match joined {
            Ok((image_path, Ok(walls))) => {
                self.processed += 1;
                self.walls += walls;
                info!("Processed {}: {} walls", image_path.display(), walls);
            }
            Ok((image_path, Err(e))) => {
                self.failed += 1;
                error!("Skipping {}: {}", image_path.display(), e);
            }
            Err(e) => {
                self.failed += 1;
                error!("Image task aborted: {}", e);
            }
        }
    }
}
