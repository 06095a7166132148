//! probegridd — the probegrid fault-detection daemon.
//!
//! One binary, four roles:
//! - `init`: create the shared control arena. Run once, before any other
//!   process attaches.
//! - `prober`: run the single prober process, with periodic probe cycles
//!   plus on-demand cycles for every wake datagram.
//! - `request`: force a fresh probe cycle, wait for it, print the table.
//! - `status`: print the cached table without forcing a probe.
//!
//! # Usage
//!
//! ```text
//! probegridd init --config grid.toml
//! probegridd prober --config grid.toml
//! probegridd request --config grid.toml
//! probegridd status --config grid.toml --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use probe_core::GridConfig;
use probegrid_arena::{ProbeArena, ProberRegistration, StatusCache};
use probegrid_prober::{ProbeCycleManager, TcpConnectProber, UdpWakeListener};
use probegrid_rendezvous::{
    CancellationToken, ProbeRequest, RendezvousCoordinator, UdpWakeSender,
};

#[derive(Parser)]
#[command(name = "probegridd", about = "probegrid fault-detection daemon")]
struct Cli {
    /// Path to the grid.toml configuration file.
    #[arg(long, global = true, default_value = "grid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the shared control arena. Run once, before any other process.
    Init,
    /// Run the prober process.
    Prober,
    /// Force a fresh probe cycle, wait for it, and print the table.
    Request,
    /// Print the cached status table without forcing a probe.
    Status {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,probegridd=debug,probegrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = GridConfig::from_file(&cli.config)?;

    match cli.command {
        Command::Init => run_init(&config),
        Command::Prober => run_prober(config).await,
        Command::Request => run_request(config).await,
        Command::Status { json } => run_status(&config, json),
    }
}

fn run_init(config: &GridConfig) -> anyhow::Result<()> {
    let arena = ProbeArena::create(&config.cluster.arena_path, config.cluster.table_size())?;
    info!(
        path = %arena.path().display(),
        nodes = config.cluster.nodes.len(),
        "control arena initialized"
    );
    Ok(())
}

async fn run_prober(config: GridConfig) -> anyhow::Result<()> {
    let arena = Arc::new(ProbeArena::attach(&config.cluster.arena_path)?);
    // Bind the wake channel before taking the prober slot: once the slot
    // is visibly ours, requesters may signal at any moment.
    let wake = UdpWakeListener::bind(config.fault_detection.wake_port).await?;
    let registration = ProberRegistration::acquire(arena.clone())?;

    let prober = TcpConnectProber::new(config.fault_detection.probe_timeout());
    let manager = ProbeCycleManager::new(registration, prober, config.cluster.nodes.clone())
        .with_probe_interval(config.fault_detection.probe_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    manager.run(wake, shutdown_rx).await;
    Ok(())
}

async fn run_request(config: GridConfig) -> anyhow::Result<()> {
    let arena = Arc::new(ProbeArena::attach(&config.cluster.arena_path)?);
    let wake = UdpWakeSender::new(config.fault_detection.wake_port)?;
    let coordinator = RendezvousCoordinator::new(arena.clone(), wake)
        .with_poll_interval(config.fault_detection.poll_interval())
        .with_fault_detection(config.fault_detection.enabled);

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_on_signal.cancel();
    });

    let outcome =
        tokio::task::spawn_blocking(move || coordinator.request_fresh_probe(&cancel)).await??;
    match outcome {
        ProbeRequest::Fresh => info!("status table is fresh"),
        ProbeRequest::Skipped => info!("no prober to wait for; cached status follows"),
    }

    print_status(&config, &arena, false)
}

fn run_status(config: &GridConfig, json: bool) -> anyhow::Result<()> {
    let arena = Arc::new(ProbeArena::attach(&config.cluster.arena_path)?);
    print_status(config, &arena, json)
}

fn print_status(config: &GridConfig, arena: &Arc<ProbeArena>, json: bool) -> anyhow::Result<()> {
    let cache = StatusCache::new(arena.clone(), config.fault_detection.enabled);
    let (started, completed) = arena.counters();

    if json {
        let nodes = config
            .cluster
            .nodes
            .iter()
            .map(|node| {
                Ok(serde_json::json!({
                    "id": node.id,
                    "address": node.address(),
                    "status": cache.get(node.id)?,
                }))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let out = serde_json::json!({
            "started": started,
            "completed": completed,
            "status_version": cache.version(),
            "fault_detection_enabled": config.fault_detection.enabled,
            "nodes": nodes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("cycles: started={started} completed={completed} version={}", cache.version());
        for node in &config.cluster.nodes {
            println!("{:<10} {:<22} {}", node.id.to_string(), node.address(), cache.get(node.id)?);
        }
    }
    Ok(())
}
