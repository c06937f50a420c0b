//! RiOS worker CLI
//!
//! Registers this machine with the RiOS control plane and runs the worker
//! loop that executes GPU jobs for rewards.

mod commands;

use clap::{Parser, Subcommand};
use rios_core::{default_config_path, WorkerConfig};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// rios-worker - contribute GPU power to the RiOS network
#[derive(Parser, Debug)]
#[command(name = "rios-worker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Control plane address (defaults to the registered endpoint)
    #[arg(long, global = true)]
    api: Option<String>,

    /// Config file (defaults to ~/.rios/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register this machine as a worker node
    Register {
        /// Skip Docker checks and report a mock GPU (for testing)
        #[arg(long)]
        skip_docker: bool,

        /// Wallet address receiving rewards (prompted when omitted)
        #[arg(long)]
        wallet: Option<String>,

        /// Contributor name shown by the network
        #[arg(long)]
        name: Option<String>,
    },

    /// Start the worker and begin processing jobs
    Run {
        /// Skip Docker and GPU checks (for testing)
        #[arg(long)]
        skip_docker: bool,

        /// Also verify that containers can access the GPU
        #[arg(long)]
        check_gpu_runtime: bool,
    },

    /// Show the detected GPU configuration
    Gpus,
}

/// Pick the log filter directive when `RUST_LOG` is not set
fn log_directive(verbose: bool, flag: Option<&str>, config_level: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    flag.filter(|l| !l.trim().is_empty())
        .or(Some(config_level).filter(|l| !l.trim().is_empty()))
        .unwrap_or("info")
        .to_lowercase()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    // Initialize logging
    let config_level = WorkerConfig::load_or_default(&config_path)
        .map(|c| c.logging.level)
        .unwrap_or_default();
    let directive = log_directive(cli.verbose, cli.log_level.as_deref(), &config_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let ctx = commands::Context {
        config_path,
        api_override: cli.api,
    };

    match cli.command {
        Commands::Register {
            skip_docker,
            wallet,
            name,
        } => {
            commands::register(&ctx, skip_docker, wallet, name).await?;
        }
        Commands::Run {
            skip_docker,
            check_gpu_runtime,
        } => {
            commands::run(&ctx, skip_docker, check_gpu_runtime).await?;
        }
        Commands::Gpus => {
            commands::gpus()?;
        }
    }

    Ok(())
}
