mod batch;
mod dimension;
mod error;
mod logger;
mod random_image;
mod transform;

use anyhow::{bail, Context};
use batch::{BatchConfig, ErrorPolicy};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use random_image::NoiseConfig;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "generate", version, about = "Generate images with noise")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add noise to every image of a directory and resize it to a random size
    #[command(visible_alias = "g")]
    Generate {
        /// Output directory for generated images
        #[arg(short, long, default_value = "./data")]
        output: PathBuf,

        /// Directory containing source images for generation
        #[arg(long)]
        source_dir: PathBuf,

        /// Base width and height of the generated images
        #[arg(short, long, default_value_t = 3000, value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        /// Seed for the random source (defaults to the current time)
        #[arg(long)]
        seed: Option<u64>,

        /// What to do when one file fails
        #[arg(long, value_enum, default_value_t = ErrorPolicy::Abort)]
        on_error: ErrorPolicy,

        /// Write a YAML report of the batch to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Generate images of pure uniform noise with random names
    #[command(visible_alias = "n")]
    Noise {
        /// Output directory for generated images
        #[arg(short, long, default_value = "./data")]
        output: PathBuf,

        /// Number of images to generate
        #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Width and height of the generated images
        #[arg(short, long, default_value_t = 3000, value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        /// Seed for the random source (defaults to the current time)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default()
    });
    log::info!("random seed: {}", seed);
    StdRng::seed_from_u64(seed)
}

fn main() -> anyhow::Result<()> {
    logger::init();

    match Cli::parse().command {
        Command::Generate {
            output,
            source_dir,
            width,
            seed,
            on_error,
            report,
        } => {
            println!(
                "output directory: {}, source directory: {}",
                output.display(),
                source_dir.display()
            );

            let config = BatchConfig {
                source_dir,
                output_dir: output,
                width,
                // Square base; width and height are still randomized separately.
                height: width,
                policy: on_error,
            };
            let mut rng = seeded_rng(seed);
            let summary = batch::run(&mut rng, &config)
                .context("failed to generate images from source")?;

            if let Some(path) = report {
                summary.save(&path)?;
                log::info!("batch report written to {}", path.display());
            }

            println!(
                "Successfully generated {} images ({:.2} MB) in directory: {}",
                summary.processed.len(),
                summary.total_bytes() as f64 / (1024.0 * 1024.0),
                config.output_dir.display()
            );
            if !summary.failed.is_empty() {
                bail!("{} source files could not be processed", summary.failed.len());
            }
        }
        Command::Noise {
            output,
            count,
            width,
            seed,
        } => {
            let config = NoiseConfig {
                output_dir: output,
                count,
                width,
                height: width,
            };
            let mut rng = seeded_rng(seed);
            let reports = random_image::run(&mut rng, &config)
                .context("failed to generate random images")?;
            println!(
                "Successfully generated {} random images in directory: {}",
                reports.len(),
                config.output_dir.display()
            );
        }
    }

    Ok(())
}
