use mnist_gan::mnist_dataset::Dataset;
use mnist_gan::report::Reporter;
use mnist_gan::upscale;
use mnist_gan::{ExecutionContext, GanConfig, Trainer};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the generator/discriminator pair on MNIST
    Train {
        /// JSON file with hyperparameters, flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        latent_size: Option<usize>,
        #[arg(long)]
        learning_rate: Option<f32>,
        #[arg(long)]
        report_every: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Upscale every image of a directory in place
    Upscale {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Vertical factor
        #[arg(long)]
        rows: Option<usize>,
        /// Horizontal factor
        #[arg(long)]
        cols: Option<usize>,
    },
}

fn load_config(path: Option<PathBuf>) -> mnist_gan::Result<GanConfig> {
    match path {
        Some(path) => GanConfig::from_json_file(path),
        None => Ok(GanConfig::default()),
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            data_dir,
            epochs,
            batch_size,
            latent_size,
            learning_rate,
            report_every,
            seed,
        } => {
            let run = || -> mnist_gan::Result<()> {
                let mut config = load_config(config)?;
                if let Some(data_dir) = data_dir {
                    config.data_dir = data_dir;
                }
                config.epochs = epochs.unwrap_or(config.epochs);
                config.batch_size = batch_size.unwrap_or(config.batch_size);
                config.latent_size = latent_size.unwrap_or(config.latent_size);
                config.learning_rate = learning_rate.unwrap_or(config.learning_rate);
                config.report_every = report_every.unwrap_or(config.report_every);
                config.seed = seed.or(config.seed);
                config.validate()?;

                let mut ctx = ExecutionContext::new(config.seed);
                let dataset = Dataset::mnist(&config.data_dir)?;
                let mut reporter = Reporter::new(&config)?;
                let mut trainer = Trainer::new(&config, &mut ctx)?;
                trainer.fit(&dataset, &mut ctx, &mut reporter)
            };
            if let Err(e) = run() {
                eprintln!("Error during training: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Upscale {
            config,
            dir,
            rows,
            cols,
        } => {
            let run = || -> mnist_gan::Result<()> {
                let config = load_config(config)?;
                let dir = dir.unwrap_or(config.upscale_dir);
                let rows = rows.unwrap_or(config.upscale_rows);
                let cols = cols.unwrap_or(config.upscale_cols);

                let summary = upscale::upscale_dir(&dir, rows, cols)?;
                for (path, e) in &summary.failures {
                    eprintln!("[WARN] skipped {}: {}", path.display(), e);
                }
                println!(
                    "Upscaled {} files by {}x{} ({} failed)",
                    summary.processed.len(),
                    rows,
                    cols,
                    summary.failures.len()
                );
                Ok(())
            };
            if let Err(e) = run() {
                eprintln!("Error during upscaling: {}", e);
                std::process::exit(1);
            }
        }
    }
}
