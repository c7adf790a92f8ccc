use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tch::{nn, Device, Kind, Tensor};
use tracing::info;
use tracing_subscriber::EnvFilter;

use omniglot_siamese::{preprocess::load_image, NetworkConfig, SiameseNetwork};

/// Score the similarity of an image pair with a freshly initialised Siamese network.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON network config; defaults are used for missing fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for weight initialisation and the random pair
    #[arg(long)]
    seed: Option<u64>,
    /// Print the layer summary
    #[arg(long)]
    summary: bool,
    /// Anchor image; a random pair is scored when no images are given
    #[arg(requires = "candidate")]
    anchor: Option<PathBuf>,
    /// Candidate image
    candidate: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => NetworkConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NetworkConfig::default(),
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!("Using seed {}", seed);
    tch::manual_seed(seed as i64);

    let vs = nn::VarStore::new(config.device.resolve());
    let net = SiameseNetwork::new(&vs.root(), config.clone())
        .context("Failed to build Siamese network")?;

    if cli.summary {
        println!("{}", net.summary());
    }

    let (first, second) = match (&cli.anchor, &cli.candidate) {
        (Some(anchor), Some(candidate)) => (
            load_image(anchor, config.input_shape)
                .with_context(|| format!("Failed to load {}", anchor.display()))?,
            load_image(candidate, config.input_shape)
                .with_context(|| format!("Failed to load {}", candidate.display()))?,
        ),
        _ => {
            let [c, h, w] = config.input_shape.chw();
            let options = (Kind::Float, vs.device());
            (
                Tensor::randn([1, c, h, w], options),
                Tensor::randn([1, c, h, w], options),
            )
        }
    };

    let pred = tch::no_grad(|| net.forward(&first, &second)).context("Forward pass failed")?;
    info!("Prediction shape: {:?}", pred.size());

    let scores = Vec::<f32>::try_from(&pred.flatten(0, -1).to_device(Device::Cpu))
        .context("Failed to read prediction")?;
    for (class, score) in scores.iter().enumerate() {
        println!("class {}: similarity {:.6}", class, score);
    }

    Ok(())
}
