//! CLI commands implementation

use anyhow::{bail, Context as _, Result};
use rios_agent::{JobExecutor, LoopSettings, SessionCounters, WorkerLoop};
use rios_api::{ControlPlane, HttpControlPlane, RegisterRequest};
use rios_core::{
    detect_capability, validate_wallet_address, Capability, NodeIdentity, RiosError,
    WorkerConfig, DEFAULT_API_ENDPOINT,
};
use rios_runtime::{DockerRuntime, DockerRuntimeConfig};
use rios_store::RoutingStore;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const RULE: &str = "---------------------------------------------------";

/// Options shared by every command
pub struct Context {
    pub config_path: PathBuf,
    pub api_override: Option<String>,
}

impl Context {
    /// Control plane endpoint: `--api`, then the registered one, then the default
    fn api_endpoint(&self, identity: Option<&NodeIdentity>) -> String {
        resolve_api_endpoint(self.api_override.as_deref(), identity)
    }
}

fn resolve_api_endpoint(api_override: Option<&str>, identity: Option<&NodeIdentity>) -> String {
    api_override
        .filter(|a| !a.trim().is_empty())
        .or_else(|| {
            identity
                .map(|i| i.api_endpoint.as_str())
                .filter(|a| !a.trim().is_empty())
        })
        .unwrap_or(DEFAULT_API_ENDPOINT)
        .to_string()
}

/// Register this machine with the control plane
pub async fn register(
    ctx: &Context,
    skip_docker: bool,
    wallet: Option<String>,
    name: Option<String>,
) -> Result<()> {
    print_banner();
    println!("Worker Registration");
    println!();

    let mut config = WorkerConfig::load_or_default(&ctx.config_path)?;

    if skip_docker {
        println!("Skipping Docker checks (--skip-docker enabled)");
    } else {
        let runtime = docker_runtime(&config, true);
        println!("Checking Docker installation...");
        if let Err(e) = check_docker(&runtime).await {
            print_guidance(&e, "Registration cancelled.");
            return Ok(());
        }
    }

    println!();
    let capability = if skip_docker {
        println!("Using mock GPU configuration (--skip-docker mode)");
        Capability::mock()
    } else {
        println!("Detecting GPU configuration...");
        match detect_capability() {
            Ok(capability) => capability,
            Err(e) => {
                print_guidance(&e, "Registration cancelled.");
                return Ok(());
            }
        }
    };
    println!("  GPU: {}", capability);

    println!();
    let interactive = wallet.is_none();
    let wallet = match wallet {
        Some(wallet) => wallet.trim().to_string(),
        None => prompt("Enter your $ROS wallet address (BSC): ")?,
    };
    validate_wallet_address(&wallet)?;

    let name = match name {
        Some(name) => Some(name),
        None if interactive => Some(prompt(
            "Enter a name for your worker (optional, press Enter to skip): ",
        )?),
        None => None,
    };

    let endpoint = ctx.api_endpoint(config.identity.as_ref());
    println!();
    println!("Registering with the RiOS control plane...");
    println!("  API Endpoint: {}", endpoint);

    let timeout = config.worker.request_timeout();
    let client = HttpControlPlane::new(&endpoint, timeout)?;
    let req = RegisterRequest::new(&capability, wallet.clone(), name);
    let resp = client
        .register(&req)
        .await
        .context("Registration failed")?;

    if !resp.success {
        bail!("Registration failed: {}", resp.message);
    }

    config.set_identity(NodeIdentity {
        node_id: resp.node_id,
        auth_token: resp.node_auth_token,
        api_endpoint: endpoint,
        wallet_address: wallet.clone(),
    });
    config
        .save(&ctx.config_path)
        .context("Failed to save configuration")?;
    info!(node_id = resp.node_id, path = %ctx.config_path.display(), "Identity saved");

    println!();
    println!("Registration successful");
    println!("  Node ID: {}", resp.node_id);
    println!("  Wallet: {}", wallet);
    println!("  Config: {}", ctx.config_path.display());
    println!();
    println!("Next step:");
    println!("  Run 'rios-worker run' to start contributing and earning $ROS");
    println!();

    Ok(())
}

/// Start the worker loop and process jobs until interrupted
pub async fn run(ctx: &Context, skip_docker: bool, check_gpu_runtime: bool) -> Result<()> {
    print_banner();
    println!("Worker Starting");
    println!();

    println!("Loading configuration...");
    let config = match WorkerConfig::load_registered(&ctx.config_path) {
        Ok(config) => config,
        Err(e @ RiosError::NotRegistered(_)) => {
            print_guidance(&e, "Worker stopped.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let identity = config.identity()?;
    let endpoint = ctx.api_endpoint(Some(identity));

    println!("  Node ID: {}", identity.node_id);
    println!("  API Endpoint: {}", endpoint);
    println!("  Wallet: {}", identity.wallet_address);
    println!();

    let runtime = docker_runtime(&config, !skip_docker);
    if skip_docker {
        println!("Skipping Docker and GPU checks (--skip-docker enabled)");
    } else {
        println!("Checking Docker...");
        let mut checked = check_docker(&runtime).await;
        if checked.is_ok() && check_gpu_runtime {
            println!("Checking container GPU access...");
            checked = runtime.check_gpu_support().await;
        }
        if let Err(e) = checked {
            print_guidance(&e, "Worker stopped.");
            return Ok(());
        }

        println!("Verifying GPU configuration...");
        match detect_capability() {
            Ok(capability) => println!("  GPU: {}", capability),
            Err(e) => {
                print_guidance(&e, "Worker stopped.");
                return Ok(());
            }
        }
    }
    println!();

    let timeout = config.worker.request_timeout();
    let control_plane =
        HttpControlPlane::new(&endpoint, timeout)?.with_auth_token(identity.auth_token.clone());
    let store = RoutingStore::new(timeout)?;

    let work_dir = config.worker.resolved_work_dir()?;
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("Failed to create work directory {}", work_dir.display()))?;

    let executor = JobExecutor::new(work_dir, runtime, store);
    let mut worker = WorkerLoop::new(
        Arc::new(control_plane),
        Arc::new(executor),
        LoopSettings::from(&config.worker),
    );

    println!("Worker is online and ready to process jobs");
    println!("  Press Ctrl+C to stop");
    println!();

    let counters = worker.run(shutdown_signal()).await;

    println!();
    println!("Worker stopped");
    print_summary(&counters);

    Ok(())
}

/// Show the detected GPU configuration
pub fn gpus() -> Result<()> {
    match detect_capability() {
        Ok(capability) => {
            println!("GPU: {}", capability.gpu_type);
            println!("  Count: {}", capability.count);
            println!("  VRAM: {} GB", capability.memory_gb);
        }
        Err(e) => print_guidance(&e, "No GPU available."),
    }
    Ok(())
}

fn docker_runtime(config: &WorkerConfig, with_gpus: bool) -> DockerRuntime {
    let defaults = DockerRuntimeConfig::default();
    DockerRuntime::new(DockerRuntimeConfig {
        binary: PathBuf::from(&config.worker.docker_binary),
        gpus: if with_gpus { defaults.gpus } else { None },
    })
}

async fn check_docker(runtime: &DockerRuntime) -> Result<(), RiosError> {
    runtime.check_installed().await?;
    println!("  Docker is installed");
    runtime.check_running().await?;
    println!("  Docker daemon is running");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
    println!();
    println!("Shutting down gracefully...");
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

fn print_banner() {
    println!();
    println!("{}", RULE);
    println!("  RiOS Compute Network - Worker v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", RULE);
    println!();
}

/// Print remediation steps for a startup failure.
///
/// These failures exit with status 0 so supervisors do not treat a machine
/// without a GPU as a crash.
fn print_guidance(err: &RiosError, closing: &str) {
    println!();
    println!("{}", RULE);
    match err {
        RiosError::Gpu(_) => {
            println!("  No NVIDIA GPU detected");
            println!("{}", RULE);
            println!();
            println!("RiOS Worker requires an NVIDIA GPU to process tasks.");
            println!();
            println!("Requirements:");
            println!("  - NVIDIA GPU (RTX 3060 or higher recommended)");
            println!("  - NVIDIA drivers installed");
            println!("  - nvidia-smi command available");
            println!();
            println!("Solutions:");
            println!("  1. Install NVIDIA drivers: https://www.nvidia.com/drivers");
            println!("  2. Switch to a machine with an NVIDIA GPU");
            println!("  3. For testing the API only: use the --skip-docker flag");
        }
        RiosError::Environment(msg) => {
            println!("  Docker is not ready");
            println!("{}", RULE);
            println!();
            println!("{}", msg);
            println!();
            println!("Solutions:");
            println!("  1. Install Docker: https://docs.docker.com/get-docker/");
            println!("  2. Start the Docker daemon");
            println!("  3. For GPU access install the NVIDIA Container Toolkit");
            println!("  4. For testing the API only: use the --skip-docker flag");
        }
        RiosError::NotRegistered(msg) => {
            println!("  Worker is not registered");
            println!("{}", RULE);
            println!();
            println!("{}", msg);
            println!();
            println!("Run 'rios-worker register' first.");
        }
        other => {
            println!("  Startup check failed");
            println!("{}", RULE);
            println!();
            println!("{}", other);
        }
    }
    println!();
    println!("{}", RULE);
    println!("  {}", closing);
    println!("{}", RULE);
    println!();
}

fn print_summary(counters: &SessionCounters) {
    println!("Session Summary:");
    println!("  Jobs Completed: {}", counters.jobs_completed);
    println!("  Total Rewards: {} $ROS", counters.rewards_earned);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(endpoint: &str) -> NodeIdentity {
        NodeIdentity {
            node_id: 7,
            auth_token: "token".to_string(),
            api_endpoint: endpoint.to_string(),
            wallet_address: "0x1111111111111111111111111111111111111111".to_string(),
        }
    }

    #[test]
    fn test_api_endpoint_precedence() {
        let stored = identity("https://stored.rios.example");

        assert_eq!(
            resolve_api_endpoint(Some("https://flag.rios.example"), Some(&stored)),
            "https://flag.rios.example"
        );
        assert_eq!(
            resolve_api_endpoint(None, Some(&stored)),
            "https://stored.rios.example"
        );
        assert_eq!(resolve_api_endpoint(None, None), DEFAULT_API_ENDPOINT);
        assert_eq!(
            resolve_api_endpoint(Some(" "), Some(&identity(""))),
            DEFAULT_API_ENDPOINT
        );
    }
}
