//! Widget Export CLI
//!
//! Exports the widgets stored in a registry state file as a portable document.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use widget_transfer::{Exporter, MemoryRegistry, RegistryState, TransferConfig, WidgetTransfer};

#[derive(Parser)]
#[command(name = "widget-export")]
#[command(about = "Export sidebar widgets to a portable document")]
struct Cli {
    /// Registry state file (defaults to registry.state_path from config)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Single-line output
    #[arg(long)]
    compact: bool,

    /// Leave out the inactive and orphaned buckets
    #[arg(long)]
    no_inactive: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TransferConfig::load_from(cli.config.as_deref())?;
    let state_path = cli
        .state
        .or_else(|| config.registry.state_path.clone())
        .ok_or_else(|| {
            anyhow!("no registry state file given (use --state or registry.state_path)")
        })?;

    let state = RegistryState::load(&state_path)
        .with_context(|| format!("reading registry state {}", state_path.display()))?;

    let mut exporter = Exporter::from_config(&config.export, config.generator_version());
    if cli.compact {
        exporter = exporter.pretty(false);
    }
    if cli.no_inactive {
        exporter = exporter.include_inactive(false);
    }

    let transfer = WidgetTransfer::new(MemoryRegistry::from_state(state)).with_exporter(exporter);
    let bytes = transfer.export()?;

    match cli.output {
        Some(path) => {
            fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("✅ Exported {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
