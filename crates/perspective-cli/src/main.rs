//! perspective CLI: runs the service daemon and talks to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use perspective_daemon::setup;
use perspective_daemon::trigger::{DisplayWatcher, InputWatcher};
use perspective_daemon::{Controller, Service};
use perspective_protocol::{PerspectiveClient, ServiceListener};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "perspective",
    about = "Control the desktop perspective",
    version,
    propagate_version = true
)]
struct Cli {
    /// Service socket path (overrides the config file).
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the perspective service.
    Daemon {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Ask the service to start the perspective.
    Start,

    /// Ask the service to stop the perspective.
    Stop,

    /// Show whether the perspective is running.
    Status,

    /// Print every state change until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { config } => run_daemon(config.as_deref(), cli.socket).await,
        Commands::Start => {
            init_logging("warn");
            let mut client = connect(cli.socket).await?;
            client.start().await?;
            println!("start requested");
            Ok(())
        }
        Commands::Stop => {
            init_logging("warn");
            let mut client = connect(cli.socket).await?;
            client.stop().await?;
            println!("stop requested");
            Ok(())
        }
        Commands::Status => {
            init_logging("warn");
            let mut client = connect(cli.socket).await?;
            let running = client.is_running().await?;
            println!("{}", if running { "running" } else { "stopped" });
            Ok(())
        }
        Commands::Watch => {
            init_logging("warn");
            let client = connect(cli.socket).await?;
            let mut events = client.subscribe().await?;
            while let Some(state) = events.next_event().await? {
                println!("{state}");
            }
            Ok(())
        }
    }
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

async fn connect(socket: Option<PathBuf>) -> anyhow::Result<PerspectiveClient> {
    let path = match socket {
        Some(path) => path,
        None => setup::socket_path(&setup::load_config(None)?),
    };
    PerspectiveClient::connect(&path)
        .await
        .with_context(|| format!("is the daemon running? ({})", path.display()))
}

async fn run_daemon(config_path: Option<&str>, socket: Option<PathBuf>) -> anyhow::Result<()> {
    let config = setup::load_config(config_path)?;
    init_logging(&config.daemon.log_level);

    let socket = socket.unwrap_or_else(|| setup::socket_path(&config));
    let platform = setup::build_platform(&config)?;
    let displays = Arc::clone(&platform.displays);
    let input = Arc::clone(&platform.input);

    let (controller, worker) = Controller::spawn(config.controller_options(), platform).await?;
    let cancel = CancellationToken::new();

    let service = spawn_service(&socket, &controller, &cancel)?;
    tokio::spawn(
        DisplayWatcher::new(
            displays,
            Duration::from_millis(config.display.poll_interval_ms),
        )
        .run(controller.clone(), cancel.clone()),
    );
    tokio::spawn(
        InputWatcher::new(input, Duration::from_millis(config.input.poll_interval_ms))
            .run(controller.clone(), cancel.clone()),
    );

    shutdown_signal().await?;
    info!("shutting down");

    cancel.cancel();
    if let Err(e) = service.await {
        warn!(error = %e, "service task failed");
    }
    controller.shutdown()?;
    worker.await.context("controller worker failed")?;
    Ok(())
}

fn spawn_service(
    socket: &Path,
    controller: &Controller,
    cancel: &CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = ServiceListener::bind(socket)
        .with_context(|| format!("failed to bind {}", socket.display()))?;
    let service = Service::new(listener, controller.clone());
    Ok(tokio::spawn(service.run(cancel.clone())))
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
