//! Widget Import CLI
//!
//! Validates a widget document and merges it into a registry state file.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use widget_transfer::{
    MemoryRegistry, RegistryState, SidebarSelection, TransferConfig, WidgetTransfer,
};

#[derive(Parser)]
#[command(name = "widget-import")]
#[command(about = "Merge a widget document into a registry")]
struct Cli {
    /// Document to import
    document: PathBuf,

    /// Registry state file (defaults to registry.state_path from config)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Declared MIME type of the document
    #[arg(long, default_value = "application/json")]
    mime: String,

    /// Import only this sidebar (repeatable)
    #[arg(long = "sidebar")]
    sidebars: Vec<String>,

    /// Print the plan without writing the state file
    #[arg(long)]
    dry_run: bool,
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

    let bytes = fs::read(&cli.document)
        .with_context(|| format!("reading {}", cli.document.display()))?;
    let state = RegistryState::load(&state_path)
        .with_context(|| format!("reading registry state {}", state_path.display()))?;

    let selection = if cli.sidebars.is_empty() {
        SidebarSelection::All
    } else {
        SidebarSelection::only(cli.sidebars)
    };

    let mut transfer = WidgetTransfer::new(MemoryRegistry::from_state(state)).with_config(&config);

    if cli.dry_run {
        let plan = transfer.plan_import(&bytes, &cli.mime, &selection)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let outcome = transfer.import(&bytes, &cli.mime, &selection)?;
    transfer
        .into_registry()
        .into_state()
        .save(&state_path)
        .with_context(|| format!("writing registry state {}", state_path.display()))?;

    let summary = outcome.summary;
    println!("✅ Imported {}", cli.document.display());
    println!("   created:           {}", summary.widgets_created);
    println!("   reused:            {}", summary.widgets_reused);
    println!("   moved to inactive: {}", summary.widgets_moved_to_inactive);
    println!("   sidebars created:  {}", summary.sidebars_created);
    println!("   sidebars updated:  {}", summary.sidebars_updated);
    for warning in &outcome.warnings {
        println!("⚠️  {}", warning);
    }
    Ok(())
}
