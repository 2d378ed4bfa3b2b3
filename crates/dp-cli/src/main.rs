//! Di-photon pipeline CLI.
//!
//! Each subcommand runs one pipeline stage; `run` wires all three through
//! the in-memory transport in a single process. Queue names and broker
//! credentials come from the environment (see `StageConfig::from_env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dp_analysis::{FitEngine, HistogramConfig};
use dp_pipeline::{
    connect_with_retry, run_fit_stage, run_process_stage, run_render_stage, InMemoryBroker,
    JsonArtifactSink, JsonEventSource, MassSummary, ProcessedSpectrum, RetryPolicy, StageConfig,
    Transport, WireMessage, DEFAULT_DATASETS,
};

#[derive(Parser)]
#[command(name = "dp-cli")]
#[command(about = "Di-photon invariant-mass spectrum pipeline")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select events, reconstruct masses, and write a mass summary
    Process {
        /// Directory holding per-dataset event JSON files
        #[arg(long, env = "DATA_PATH")]
        data_dir: PathBuf,

        /// Comma-separated dataset identifiers (defaults to all periods)
        #[arg(long)]
        datasets: Option<String>,

        /// Fraction of events analysed per dataset
        #[arg(long, default_value = "1.0")]
        fraction: f64,

        /// Output file for the mass summary (JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Histogram a mass summary and fit the spectrum
    Fit {
        /// Input mass summary (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Lower edge of the histogram (GeV)
        #[arg(long, default_value = "100.0")]
        xmin: f64,

        /// Upper edge of the histogram (GeV)
        #[arg(long, default_value = "160.0")]
        xmax: f64,

        /// Bin width (GeV)
        #[arg(long, default_value = "2.0")]
        step: f64,

        /// Output file for the processed spectrum (pretty JSON).
        /// Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run all three stages over the in-memory transport
    Run {
        /// Directory holding per-dataset event JSON files
        #[arg(long, env = "DATA_PATH")]
        data_dir: PathBuf,

        /// Comma-separated dataset identifiers (defaults to all periods)
        #[arg(long)]
        datasets: Option<String>,

        /// Fraction of events analysed per dataset
        #[arg(long, default_value = "1.0")]
        fraction: f64,

        /// Directory for spectrum artifacts
        #[arg(long, default_value = "fit_images")]
        out_dir: PathBuf,

        /// Receive timeout for the consuming stages (seconds)
        #[arg(long, default_value = "5")]
        timeout: u64,

        /// Maximum transport connection attempts
        #[arg(long, default_value = "12")]
        retry_attempts: u32,

        /// Pause between connection attempts (seconds)
        #[arg(long, default_value = "5")]
        retry_interval: u64,
    },
}

fn parse_datasets(arg: Option<String>) -> Vec<String> {
    match arg {
        Some(s) => s.split(',').map(|d| d.trim().to_string()).filter(|d| !d.is_empty()).collect(),
        None => DEFAULT_DATASETS.iter().map(|d| d.to_string()).collect(),
    }
}

fn write_output(bytes: &[u8], output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", String::from_utf8_lossy(bytes)),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Logs go to stderr; stdout is reserved for the JSON artifacts.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process { data_dir, datasets, fraction, output } => {
            let datasets = parse_datasets(datasets);
            let source = JsonEventSource::new(data_dir);
            // File mode still goes through the transport seam: a local
            // queue stands in for the broker edge.
            let broker = InMemoryBroker::new();
            let cfg = StageConfig::from_env();
            run_process_stage(&source, &broker, &datasets, fraction, &cfg.mass_queue)?;

            let delivery = broker
                .consume(&cfg.mass_queue, Some(Duration::from_millis(10)))?
                .context("process stage published nothing")?;
            let summary = MassSummary::parse(&delivery.payload)?;
            write_output(&serde_json::to_vec_pretty(&summary)?, output.as_ref())?;
        }

        Commands::Fit { input, xmin, xmax, step, output } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let summary = MassSummary::parse(&bytes)?;

            let config = HistogramConfig { xmin, xmax, step };
            let hist = dp_analysis::Histogram::fill(&summary.mass_values, &config)?;
            let fit = FitEngine::new().fit(&hist)?;
            let signal = dp_analysis::extract_signal(&hist, &fit.background);

            let spectrum = ProcessedSpectrum {
                bin_centres: hist.bin_centres.clone(),
                data_x: hist.counts.iter().map(|&c| c as f64).collect(),
                data_x_errors: hist.errors.clone(),
                background: fit.background,
                signal_x: signal,
                best_fit: fit.best_fit,
            };
            write_output(&serde_json::to_vec_pretty(&spectrum)?, output.as_ref())?;
        }

        Commands::Run {
            data_dir,
            datasets,
            fraction,
            out_dir,
            timeout,
            retry_attempts,
            retry_interval,
        } => {
            let datasets = parse_datasets(datasets);
            let mut cfg = StageConfig::from_env()
                .with_receive_timeout(Duration::from_secs(timeout));
            cfg.retry = RetryPolicy {
                max_attempts: retry_attempts,
                interval: Duration::from_secs(retry_interval),
            };

            let broker = connect_with_retry(
                || Ok(InMemoryBroker::new()),
                &cfg.retry,
            )?;
            let source = JsonEventSource::new(data_dir);

            let n =
                run_process_stage(&source, &broker, &datasets, fraction, &cfg.mass_queue)?;
            tracing::info!(events = n, "selection stage finished");

            let stats = run_fit_stage(
                &broker,
                &HistogramConfig::default(),
                &FitEngine::new(),
                &cfg.mass_queue,
                &cfg.spectrum_queue,
                cfg.receive_timeout,
            )?;
            tracing::info!(processed = stats.processed, skipped = stats.skipped, "fit stage");

            let mut sink = JsonArtifactSink::new(out_dir);
            let stats =
                run_render_stage(&broker, &mut sink, &cfg.spectrum_queue, cfg.receive_timeout)?;
            tracing::info!(processed = stats.processed, "render stage");
        }
    }

    Ok(())
}
