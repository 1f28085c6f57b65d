use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use evmail::config::{self, Config};
use evmail::mail::ImapClient;
use evmail::pipeline::{IngestPipeline, PipelineError};
use evmail::status;

#[derive(Parser)]
#[command(name = "evmail")]
#[command(about = "Imports community events from a mailbox", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ~/.evmail/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one import now (the cron entry point)
    Run,
    /// Show recent imports and the processing log
    Status,
    /// Verify the IMAP connection and folder without importing
    TestConnection,
}

/// Exit code when another run already holds the lock, so cron wrappers
/// can tell overlap from a genuine failure.
const EXIT_ALREADY_RUNNING: u8 = 2;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run => run_import(config),
        Commands::Status => show_status(config),
        Commands::TestConnection => test_connection(config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()
            .context("cannot resolve home directory for the default config path")?,
    };
    evmail::load_config(&path).with_context(|| format!("loading {}", path.display()))
}

fn run_import(config: Config) -> Result<ExitCode> {
    let pipeline = IngestPipeline::new(config)?;

    let report = match runtime()?.block_on(pipeline.run()) {
        Ok(report) => report,
        Err(PipelineError::AlreadyRunning { path }) => {
            eprintln!(
                "Another import is already running (lock file {})",
                path.display()
            );
            return Ok(ExitCode::from(EXIT_ALREADY_RUNNING));
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", report.summary());
    Ok(ExitCode::SUCCESS)
}

fn show_status(config: Config) -> Result<ExitCode> {
    let report = status::gather(&config)?;
    print!("{}", report.render());
    Ok(ExitCode::SUCCESS)
}

fn test_connection(config: Config) -> Result<ExitCode> {
    let Some(imap) = config.imap else {
        print!("{}", evmail::mail::setup_instructions());
        return Ok(ExitCode::FAILURE);
    };

    runtime()?.block_on(async move {
        let mut client = ImapClient::new(imap.clone());
        client.connect().await?;
        client.select_folder(&imap.folder).await?;
        let unseen = client.search_unseen().await?;
        println!(
            "Connected to {} as {}; folder '{}' has {} unread message(s)",
            imap.host,
            imap.username,
            imap.folder,
            unseen.len()
        );
        client.disconnect().await?;
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(ExitCode::SUCCESS)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
