use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "contactflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contact workflow orchestrator: stage, validate and persist contacts", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CONTACTFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bulk submission against in-process stores and print the batch
    RunBatch(commands::batch::RunBatchArgs),
    /// Inspect or write the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Canonicalize a social profile URL
    Normalize {
        /// Profile URL or bare `domain/path`
        url: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the resolved configuration path
    Path,
    /// Write the default configuration if no file exists yet
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("contactflow={0},contactflow_application={0},warn", log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::RunBatch(args) => commands::batch::run(cli.config, args).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(cli.config)?,
            ConfigAction::Path => commands::config::path(cli.config)?,
            ConfigAction::Init => commands::config::init(cli.config)?,
        },
        Commands::Normalize { url } => commands::normalize::run(&url)?,
    }

    Ok(())
}
