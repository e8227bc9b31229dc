use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use stream_archiver::config::AppConfig;
use stream_archiver::logging::init_logging;
use stream_archiver::services::{Service, ServiceContainer};
use stream_archiver::signal::wait_for_stop_signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "stream-archiver",
    version,
    about = "Record scheduled live streams, post-process and publish them"
)]
struct Cli {
    /// Configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "STREAM_ARCHIVER_CONFIG",
        default_value = "config.toml"
    )]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record streams on their weekly schedule.
    Record,
    /// Run the post-processing command on finished recordings.
    Postprocess(StageArgs),
    /// Publish post-processed files.
    Upload(StageArgs),
    /// Run the recorder and both stages in one process.
    Run,
}

#[derive(Args)]
struct StageArgs {
    /// Number of workers.
    #[arg(long)]
    workers: Option<usize>,
    /// Directory to watch.
    #[arg(long)]
    watch_dir: Option<PathBuf>,
}

impl Command {
    /// Apply command-line overrides and return the services to start.
    fn apply(&self, config: &mut AppConfig) -> Vec<Service> {
        match self {
            Command::Record => vec![Service::Record],
            Command::Postprocess(args) => {
                if let Some(workers) = args.workers {
                    config.postprocess.workers = workers;
                }
                if let Some(dir) = &args.watch_dir {
                    config.postprocess.watch_dir = dir.clone();
                }
                vec![Service::Postprocess]
            }
            Command::Upload(args) => {
                if let Some(workers) = args.workers {
                    config.upload.workers = workers;
                }
                if let Some(dir) = &args.watch_dir {
                    config.upload.watch_dir = dir.clone();
                }
                vec![Service::Upload]
            }
            Command::Run => Service::ALL.to_vec(),
        }
    }

    /// Log file family for this command.
    fn log_name(&self) -> &'static str {
        match self {
            Command::Record => "record",
            Command::Postprocess(_) => "postprocess",
            Command::Upload(_) => "upload",
            Command::Run => "stream-archiver",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let services = cli.command.apply(&mut config);
    config.validate().context("invalid command-line override")?;

    let (logging, _guard) = init_logging(&config.logging, cli.command.log_name())?;
    let background = CancellationToken::new();
    logging.start_retention_cleanup(background.clone());

    info!(
        config = %cli.config.display(),
        services = ?services,
        log_dir = %logging.log_dir().display(),
        "stream-archiver starting"
    );

    let mut container = ServiceContainer::start(&config, &services).await?;

    let signal = wait_for_stop_signal().await?;
    info!(signal, "Received shutdown signal");

    container.shutdown().await;
    background.cancel();

    info!("stream-archiver stopped");
    Ok(())
}
