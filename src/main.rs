use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch::{config, matcher, storage, Dataset, ImagePreprocessor, MatchReport, Metric, Policy, SpaceHandle};
use log::{error, info, warn};

#[derive(Parser)]
#[command(name = "facematch")]
#[command(version, about = "Find the known faces most similar to a query image")]
struct Cli {
    /// Directory holding model.bin and dataset.bin (overrides config)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match an image against the dataset and print the ranked result
    Match {
        /// Query image, or `-` to read encoded image bytes from stdin
        #[arg(short, long)]
        image: PathBuf,
        /// Similarity metric: cosine or euclidean
        #[arg(long)]
        metric: Option<String>,
        /// Ranking policy: all, person or diverse
        #[arg(long)]
        policy: Option<String>,
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,
        /// Per-identity cap for the diverse policy
        #[arg(long, allow_negative_numbers = true)]
        max_per_person: Option<i64>,
    },
    /// Load the artifacts and report dataset info
    Health,
    /// Add an image of a known identity to the dataset
    Enroll {
        #[arg(short, long)]
        label: String,
        #[arg(short, long)]
        image: PathBuf,
        /// Locator stored for the image (defaults to the image path)
        #[arg(long)]
        reference: Option<String>,
    },
    /// Remove every dataset entry of an identity
    Purge {
        #[arg(short, long)]
        label: String,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;
    let model_dir = cli.model_dir.unwrap_or_else(|| cfg.model_dir.clone());

    match cli.command {
        Commands::Match {
            image,
            metric,
            policy,
            top_k,
            max_per_person,
        } => {
            let metric = match metric {
                Some(m) => m.parse()?,
                None => cfg.metric,
            };
            let policy = Policy::from_selector(
                policy.as_deref().unwrap_or(&cfg.policy),
                top_k.unwrap_or(cfg.top_k),
                max_per_person.unwrap_or(cfg.max_per_person),
            )?;
            match_image(&cfg, &model_dir, &image, metric, policy)
        }
        Commands::Health => health(&model_dir),
        Commands::Enroll {
            label,
            image,
            reference,
        } => enroll(&cfg, &model_dir, &label, &image, reference),
        Commands::Purge { label } => purge(&model_dir, &label),
        Commands::Config => open_config(),
    }
}

fn preprocessor(cfg: &config::Config) -> ImagePreprocessor {
    ImagePreprocessor::new(cfg.image_width, cfg.image_height)
}

/// Raw features of the query image, read from stdin when the path is `-`.
fn read_query(cfg: &config::Config, image: &Path) -> Result<Vec<f32>> {
    if image == Path::new("-") {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read image from stdin")?;
        return preprocessor(cfg)
            .read_bytes(&bytes)
            .context("Failed to decode image from stdin");
    }
    preprocessor(cfg)
        .read_path(image)
        .with_context(|| format!("Failed to read {}", image.display()))
}

fn match_image(
    cfg: &config::Config,
    model_dir: &Path,
    image: &Path,
    metric: Metric,
    policy: Policy,
) -> Result<()> {
    let handle = SpaceHandle::new();
    handle.install(storage::load_space(model_dir).context("Failed to load feature space")?);
    let space = handle.snapshot()?;

    let raw = read_query(cfg, image)?;
    let query = space.project(&raw).context("Failed to project query image")?;

    info!("Matching {} ({}, {})", image.display(), metric, policy);
    let records = matcher::find_matches(&query, &space, metric, policy)?;
    let report = MatchReport::new(
        records,
        space.dataset(),
        policy,
        metric,
        cfg.image_base_url.as_deref(),
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn health(model_dir: &Path) -> Result<()> {
    let handle = SpaceHandle::new();
    match storage::load_space(model_dir) {
        Ok(space) => {
            handle.install(space);
        }
        Err(e) => {
            error!("Unhealthy: {}", e);
            println!("{}", serde_json::to_string_pretty(&handle.info())?);
            return Err(e).context("Feature space not loaded");
        }
    }

    let info = handle.info();
    if info.total_entries == 0 {
        warn!("Dataset is empty; every match request will fail");
    }
    info!("✓ Feature space healthy");
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn enroll(
    cfg: &config::Config,
    model_dir: &Path,
    label: &str,
    image: &Path,
    reference: Option<String>,
) -> Result<()> {
    info!("Enrolling {} as: {}", image.display(), label);

    let model = storage::load_model(model_dir).context("Failed to load model")?;
    let mut dataset = if model_dir.join(storage::DATASET_FILE).exists() {
        storage::load_dataset(model_dir)?.0
    } else {
        Dataset::default()
    };

    let raw = preprocessor(cfg)
        .read_path(image)
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let reduced = model.project(&raw)?;

    let keeps_references = dataset.is_empty() || !dataset.references().is_empty();
    if !keeps_references {
        warn!("Dataset has no image references; not storing one for this entry");
    }
    let reference = keeps_references
        .then(|| reference.unwrap_or_else(|| image.display().to_string()));

    let index = dataset.push(label.to_string(), reduced, reference)?;
    let metadata = storage::save_dataset(model_dir, &model, &dataset)
        .context("Failed to save dataset")?;

    info!(
        "✓ Enrolled {} at index {} ({} entries, {} identities)",
        label, index, metadata.total_entries, metadata.unique_identities
    );
    Ok(())
}

fn purge(model_dir: &Path, label: &str) -> Result<()> {
    info!("Purging dataset entries for: {}", label);

    let model = storage::load_model(model_dir).context("Failed to load model")?;
    let (mut dataset, _) = storage::load_dataset(model_dir).context("Failed to load dataset")?;

    let removed = dataset.remove_identity(label);
    if removed == 0 {
        warn!("No entries found for: {}", label);
        return Ok(());
    }
    storage::save_dataset(model_dir, &model, &dataset).context("Failed to save dataset")?;

    info!("✓ Removed {} entries for: {}", removed, label);
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
