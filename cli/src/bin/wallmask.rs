use clap::{Parser, Subcommand};
use cli::{BatchConfig, BatchSummary, output_paths, process_image};
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};
use wallmask::{Pipeline, WallExtractorConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract walls from every image in a directory using a configuration file
    Process {
        /// Path to the TOML or JSON batch configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Extract walls from a single floor plan
    Extract {
        /// Path to the floor plan image
        #[arg(short, long)]
        input: PathBuf,
        /// Directory for `<stem>.geojson` (and `<stem>_mask.png`)
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Also save the cleaned wall mask
        #[arg(long)]
        save_mask: bool,
    },
    /// Print the JSON schema of the extractor configuration
    Schema,
    /// Write a batch configuration with default thresholds
    InitConfig {
        /// Destination file (.toml or .json)
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "plans")]
        input_dir: PathBuf,
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Process { config } => {
            process_batch(config).await?;
        }
        Commands::Extract { input, output_dir, save_mask } => {
            extract_single(input, output_dir, *save_mask)?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&WallExtractorConfig::schema())?);
        }
        Commands::InitConfig { output, input_dir, output_dir } => {
            BatchConfig::new(input_dir, output_dir).to_file(output)?;
            info!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn extract_single(input: &Path, output_dir: &Path, save_mask: bool) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let pipeline = Pipeline::builder().build();
    let outputs = output_paths(output_dir, input);

    let walls = process_image(&pipeline, input, &outputs, save_mask)?;
    info!("{} walls -> {}", walls, outputs.geojson.display());
    Ok(())
}

async fn process_batch(config_path: &Path) -> Result<()> {
    let config = BatchConfig::from_file(config_path)?;
    let pipeline = Arc::new(Pipeline::from_config(&config.extractor)?);
    info!("{}", pipeline.info());

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&config.output_dir)?;

    let images = config.collect_images()?;
    if images.is_empty() {
        warn!("No images with extensions {:?} in {}", config.extensions, config.input_dir.display());
        return Ok(());
    }
    info!("Processing {} images from {}", images.len(), config.input_dir.display());

    // each image is independent; the semaphore only bounds CPU use
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut tasks = JoinSet::new();

    for image_path in images {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let pipeline = Arc::clone(&pipeline);
        let outputs = config.output_paths(&image_path);
        let save_mask = config.save_masks;

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = process_image(&pipeline, &image_path, &outputs, save_mask);
            (image_path, result)
        });
    }

    let mut summary = BatchSummary::default();
    while let Some(joined) = tasks.join_next().await {
        summary.record(joined);
    }

    info!(
        "✅ Batch finished: {} processed, {} failed, {} walls",
        summary.processed, summary.failed, summary.walls
    );
    Ok(())
}
