//! QuantLab CLI — run, sweep, and validate backtests from TOML configs.
//!
//! Commands:
//! - `run` — execute one backtest and save its artifacts
//! - `sweep` — run a parameter grid (optionally a seeded random subset) and rank by Sharpe
//! - `validate` — load config and data and check them without simulating

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quantlab_core::engine::validate_inputs;
use quantlab_runner::export::{render_summary, sweep_csv};
use quantlab_runner::{
    load_dataset, run_from_config, write_artifacts, BacktestConfig, ParamGrid, ParamSweep,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "quantlab", about = "QuantLab CLI — event-driven bar-by-bar backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Sweep execution parameters over the config's dataset.
    Sweep {
        /// Path to a TOML config file (the base point of the grid).
        #[arg(long)]
        config: PathBuf,

        /// Comma-separated max_positions values (e.g. 1,2,5).
        #[arg(long, value_delimiter = ',')]
        max_positions: Vec<usize>,

        /// Comma-separated participation rates (e.g. 0.05,0.1).
        #[arg(long, value_delimiter = ',')]
        participation: Vec<f64>,

        /// Comma-separated minimum order notionals.
        #[arg(long, value_delimiter = ',')]
        min_notional: Vec<f64>,

        /// Comma-separated commission rates.
        #[arg(long, value_delimiter = ',')]
        commission: Vec<f64>,

        /// Run only a random subset of this many grid points.
        #[arg(long)]
        sample: Option<usize>,

        /// Seed for --sample.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Run points one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the ranked summaries to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load and validate config and data without running.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output_dir } => run_cmd(&config, &output_dir),
        Commands::Sweep {
            config,
            max_positions,
            participation,
            min_notional,
            commission,
            sample,
            seed,
            sequential,
            output,
        } => {
            let grid = ParamGrid {
                max_positions,
                participation_rates: participation,
                min_order_notionals: min_notional,
                commission_rates: commission,
            };
            sweep_cmd(&config, &grid, sample, seed, sequential, output.as_deref())
        }
        Commands::Validate { config } => validate_cmd(&config),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn run_cmd(config_path: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let report = run_from_config(&config)?;

    print!("{}", render_summary(&report));

    let paths = write_artifacts(&report, output_dir)?;
    println!("\nArtifacts saved to: {}", paths.dir.display());
    Ok(())
}

fn sweep_cmd(
    config_path: &Path,
    grid: &ParamGrid,
    sample: Option<usize>,
    seed: u64,
    sequential: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let data = load_dataset(&config.data)?;
    let base = config.to_engine_config();

    let points = match sample {
        Some(n) => grid.sample(&base, n, seed),
        None => grid.generate_configs(&base),
    };
    info!(points = points.len(), grid = grid.size(), "starting sweep");

    let results = ParamSweep::new()
        .with_parallelism(!sequential)
        .run(&points, &data, config.date_range(), None);

    println!(
        "{:>4}  {:>6}  {:>8}  {:>14}  {:>10}  {:>8}  {:>9}  {:>8}  {:>6}",
        "rank", "max_p", "partic", "min_notional", "commission", "sharpe", "return", "max_dd", "trades"
    );
    for (i, s) in results.summaries.iter().enumerate() {
        println!(
            "{:>4}  {:>6}  {:>8.4}  {:>14.0}  {:>10.5}  {:>8.3}  {:>8.2}%  {:>7.2}%  {:>6}",
            i + 1,
            s.params.max_positions,
            s.params.max_participation_rate,
            s.params.min_order_notional,
            s.params.commission_rate,
            s.sharpe,
            s.total_return * 100.0,
            s.max_drawdown * 100.0,
            s.num_trades
        );
    }
    for f in &results.failures {
        eprintln!("failed {:?}: {}", f.params, f.error);
    }

    if let Some(path) = output {
        std::fs::write(path, sweep_csv(&results)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep results saved to: {}", path.display());
    }
    Ok(())
}

fn validate_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let data = load_dataset(&config.data)?;
    validate_inputs(
        &config.to_engine_config(),
        &data.prices,
        &data.signals,
        &config.date_range(),
    )?;

    println!(
        "OK: {} instruments, {} bars, dataset {}",
        data.prices.len(),
        data.bar_count(),
        data.dataset_hash.short()
    );
    Ok(())
}
