//! Stringnet Ingest - STRING network loader

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use stringnet_common::logging::{init_logging, LogConfig, LogGuard, LogLevel};
use stringnet_ingest::config::{CutoffOverrides, ProfileSettings, DEFAULT_PROFILE};
use stringnet_ingest::fetch::download_sources;
use stringnet_ingest::pipeline::{self, OutputSummary};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "stringnet-ingest")]
#[command(author, version, about = "Load STRING protein interaction networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ~/.stringnet.conf)
    #[arg(long, global = true, value_name = "PATH")]
    conf: Option<PathBuf>,

    /// Configuration profile
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,
}

#[derive(Args, Debug)]
struct DataDir {
    /// Directory holding the source and output files
    #[arg(long, value_name = "DIR")]
    datadir: PathBuf,
}

#[derive(Args, Debug, Clone, Copy)]
struct CutoffArgs {
    /// Minimum combined score for the primary output
    #[arg(long)]
    cutoff_score: Option<f64>,

    /// Minimum combined score for the high-confidence output
    #[arg(long)]
    hi_conf_cutoff_score: Option<f64>,
}

impl From<CutoffArgs> for CutoffOverrides {
    fn from(args: CutoffArgs) -> Self {
        Self {
            cutoff_score: args.cutoff_score,
            hi_conf_cutoff_score: args.hi_conf_cutoff_score,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and unpack the edge list and mapping files
    Download {
        #[command(flatten)]
        data: DataDir,
    },

    /// Join the edge list with the mapping files
    Transform {
        #[command(flatten)]
        data: DataDir,

        #[command(flatten)]
        cutoffs: CutoffArgs,
    },

    /// Download, then transform
    Load {
        #[command(flatten)]
        data: DataDir,

        #[command(flatten)]
        cutoffs: CutoffArgs,

        /// Use the files already in the data directory
        #[arg(long)]
        skip_download: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.verbose);

    if let Err(e) = execute(&cli).await {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Logging is best effort; the loader still runs without it
fn setup_logging(verbosity: u8) -> Option<LogGuard> {
    let log_config = LogConfig::builder()
        .level(LogLevel::from_verbosity(verbosity))
        .log_file_prefix("stringnet-ingest")
        .build();

    let result = log_config
        .with_env_overrides()
        .and_then(|config| init_logging(&config));

    match result {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let settings = ProfileSettings::load(cli.conf.as_deref(), &cli.profile)
        .context("Failed to load configuration")?;

    match &cli.command {
        Command::Download { data } => download(&settings, &data.datadir).await,
        Command::Transform { data, cutoffs } => {
            transform(&settings, &data.datadir, (*cutoffs).into()).await
        },
        Command::Load {
            data,
            cutoffs,
            skip_download,
        } => {
            if *skip_download {
                info!("Skipping download");
            } else {
                download(&settings, &data.datadir).await?;
            }
            transform(&settings, &data.datadir, (*cutoffs).into()).await
        },
    }
}

async fn download(settings: &ProfileSettings, datadir: &Path) -> Result<()> {
    let downloads = settings.downloads(datadir)?;
    tokio::fs::create_dir_all(datadir)
        .await
        .with_context(|| format!("Failed to create {}", datadir.display()))?;

    download_sources(&downloads)
        .await
        .context("Download failed")?;
    Ok(())
}

async fn transform(
    settings: &ProfileSettings,
    datadir: &Path,
    cutoffs: CutoffOverrides,
) -> Result<()> {
    let config = settings.pipeline_config(datadir, cutoffs)?;

    let summary = tokio::task::spawn_blocking(move || pipeline::run(&config))
        .await
        .context("Transform task failed")?
        .context("Transform failed")?;

    print_output(&summary.output);
    if let Some(output) = &summary.high_confidence {
        print_output(output);
    }
    if summary.join.malformed > 0 {
        println!("Skipped {} malformed edge lines", summary.join.malformed);
    }
    Ok(())
}

fn print_output(output: &OutputSummary) {
    println!(
        "Wrote {} edges to {} (sha256 {})",
        output.rows,
        output.path.display(),
        output.sha256
    );
}
