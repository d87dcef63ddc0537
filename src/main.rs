//! talos-installer: Interactive installer for Talos Linux nodes

use clap::Parser;
use color_eyre::Result;
use std::fs::File;
use std::path::PathBuf;
use talos_installer_core::{InstallerState, TalosctlConnection};
use talos_installer_tui::{App, OutputOptions};
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

/// talos-installer: Generate machine config for a node in maintenance mode
#[derive(Parser, Debug)]
#[command(name = "talos-installer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the node being installed (e.g., 192.168.1.100)
    #[arg(short, long)]
    endpoint: String,

    /// Address of an existing control plane node; joins that cluster instead of bootstrapping
    #[arg(short, long, requires = "secrets")]
    bootstrap_endpoint: Option<String>,

    /// Secrets bundle of the cluster (from `talosctl gen secrets`), required when joining
    #[arg(short, long)]
    secrets: Option<PathBuf>,

    /// Directory the generated config is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Apply the generated config to the node
    #[arg(short, long)]
    apply: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file path (default: <temp_dir>/talos-installer.log)
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging to file (not stdout, which would corrupt TUI)
    let log_path = resolve_log_path(cli.log_file);
    let log_file = File::create(&log_path)?;

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .init();

    tracing::info!("Starting talos-installer for {}", cli.endpoint);

    let mut conn = TalosctlConnection::new(cli.endpoint);
    if let Some(bootstrap) = cli.bootstrap_endpoint {
        tracing::info!("Joining cluster via {}", bootstrap);
        conn = conn.with_bootstrap_endpoint(bootstrap);
    }
    if let Some(secrets) = cli.secrets {
        tracing::info!("Using secrets bundle {}", secrets.display());
        conn = conn.with_secrets(secrets);
    }

    // Disk inventory happens before the terminal is taken over so failures print plainly
    let state = InstallerState::new(conn).await?;

    let mut app = App::new(
        state,
        OutputOptions {
            dir: cli.output_dir,
            apply: cli.apply,
        },
    );
    app.run().await?;

    for file in app.written_files() {
        println!("Wrote {}", file.display());
    }

    tracing::info!("Goodbye!");
    Ok(())
}

/// Resolve the log file path, falling back to the platform temp directory.
fn resolve_log_path(log_file: Option<String>) -> PathBuf {
    match log_file {
        Some(path) => PathBuf::from(path),
        None => std::env::temp_dir().join("talos-installer.log"),
    }
}
