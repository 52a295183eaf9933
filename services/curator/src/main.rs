//! Earth-observation dataset curator.
//!
//! Indexes a folder of label files, matches each (date, bbox) entry against
//! configured data connectors, downloads the best scenes, and rasterizes the
//! labels onto each scene's grid.

mod config;
mod lineage;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::CuratorConfig;
use pipeline::PipelineContext;

#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(about = "Curates ML-ready imagery/label pairs from labeled events")]
struct Args {
    /// Dataset name, used as the prefix of every produced file
    #[arg(short, long)]
    dataset_name: String,

    /// Directory where indexes, scenes, and label rasters are written
    #[arg(short, long, default_value = "./curation")]
    working_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "curator.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index the labels folder into the bbox/labels geometry files
    Labels,
    /// Match index entries against data sources and download scenes
    Download,
    /// Burn indexed labels onto scenes already in the working directory
    Rasterize,
    /// Full pipeline: labels, download, rasterize
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::FAILURE;
    }

    // Provider credentials come from the environment; a .env file is a
    // convenience, its absence is not an error.
    let _ = dotenvy::dotenv();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = CuratorConfig::load(&args.config)?;
    let ctx = PipelineContext {
        dataset_name: args.dataset_name,
        working_dir: args.working_dir,
        config,
    };
    std::fs::create_dir_all(&ctx.working_dir)?;

    match args.command {
        Command::Labels => {
            let index = pipeline::run_labels(&ctx)?;
            info!(entries = index.bboxes.len(), "labels step complete");
        }
        Command::Download => {
            let index = pipeline::load_or_build_index(&ctx)?;
            let output = pipeline::run_download(&ctx, &index).await?;
            let summary = output.manifest.summary();
            if summary.matched == 0 {
                anyhow::bail!(
                    "no scenes matched ({} unmatched, {} failed)",
                    summary.unmatched,
                    summary.failed
                );
            }
            info!(matched = summary.matched, "download step complete");
        }
        Command::Rasterize => {
            let index = pipeline::load_or_build_index(&ctx)?;
            let succeeded = pipeline::run_rasterize(&ctx, &index)?;
            if succeeded == 0 {
                anyhow::bail!("no scene was rasterized");
            }
            info!(succeeded, "rasterize step complete");
        }
        Command::Run => {
            let succeeded = pipeline::run_all(&ctx).await?;
            if succeeded == 0 {
                anyhow::bail!("pipeline produced no raster/label pairs");
            }
            info!(succeeded, "pipeline complete");
        }
    }
    Ok(())
}
