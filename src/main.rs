mod analysis;
mod backtest;
mod config;
mod db;
mod error;
mod ingest;
mod pipeline;
mod sources;
mod types;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::{Pipeline, PredictOptions};

#[derive(Parser)]
#[command(name = "draw-pipeline")]
#[command(about = "Four-digit draw ingestion, prediction and backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent draws from every configured source
    Ingest {
        /// Retention ceiling override
        #[arg(long)]
        retention: Option<usize>,
    },
    /// Generate and save the prediction set for a draw
    Predict {
        /// Analysis window override
        #[arg(short, long)]
        window: Option<usize>,
        /// Target draw number (default: latest stored + 1)
        #[arg(short, long)]
        draw: Option<u64>,
        /// Replace an existing prediction set
        #[arg(long)]
        force: bool,
    },
    /// Replay recent draws against predictions built from their own past
    Backtest {
        #[arg(short, long)]
        window: Option<usize>,
        /// Number of recent draws to replay
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Score a saved prediction set against its actual result
    Evaluate {
        /// Draw number (default: most recent scorable set)
        #[arg(short, long)]
        draw: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    match run(cfg, cli.command).await {
        Ok(()) => {}
        Err(AppError::PredictionExists(n)) => {
            warn!("Prediction set for draw {n} already exists, nothing to do (use --force to regenerate)");
        }
        Err(e) => {
            error!("Fatal error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: Config, command: Commands) -> Result<()> {
    let pool = db::connect(&cfg.database_url).await?;
    let pipeline = Pipeline::new(cfg, pool);

    match command {
        Commands::Ingest { retention } => {
            let report = pipeline.ingest(retention).await?;
            if !report.failed_sources.is_empty() {
                warn!("Sources unavailable this run: {}", report.failed_sources.join(", "));
            }
            print_json(&report)?;
        }
        Commands::Predict { window, draw, force } => {
            let set = pipeline
                .predict(PredictOptions { window, draw_number: draw, force })
                .await?;
            print_json(&set)?;
        }
        Commands::Backtest { window, depth } => {
            let report = pipeline.replay(depth, window).await?;
            print_json(&report)?;
        }
        Commands::Evaluate { draw } => {
            let report = pipeline.evaluate_stored(draw).await?;
            print_json(&report)?;
        }
    }

    info!("Done");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
