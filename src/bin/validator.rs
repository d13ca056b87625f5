//! Widget Document Validator CLI
//!
//! Checks widget documents without touching a registry, and compares two
//! documents after normalizing them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use similar::{ChangeTag, TextDiff};
use tracing_subscriber::EnvFilter;
use widget_transfer::{ExportDocument, Exporter, TransferConfig, Validator};

#[derive(Parser)]
#[command(name = "widget-validator")]
#[command(about = "Validate and compare widget documents")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document as an import would
    Check {
        document: PathBuf,
        /// Declared MIME type of the document
        #[arg(long, default_value = "application/json")]
        mime: String,
    },

    /// Show differences between two documents
    Diff {
        from: PathBuf,
        to: PathBuf,
    },
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
    let validator = Validator::from_config(&config.import);

    match cli.command {
        Commands::Check { document, mime } => {
            let doc = read_document(&validator, &document, &mime)?;
            println!("✅ {} is valid", document.display());
            println!("   format version: {}", doc.format_version);
            println!("   sidebars:       {}", doc.sidebars.len());
            println!("   widgets:        {}", doc.widgets.len());
            Ok(())
        }

        Commands::Diff { from, to } => {
            // Both sides go through the exporter so key order and layout
            // differences do not show up.
            let exporter = Exporter::new(config.generator_version());
            let before = read_document(&validator, &from, "application/json")?;
            let after = read_document(&validator, &to, "application/json")?;
            let before = normalized(&exporter, &before)?;
            let after = normalized(&exporter, &after)?;

            let diff = TextDiff::from_lines(&before, &after);
            let mut changed = false;
            for change in diff.iter_all_changes() {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => continue,
                };
                changed = true;
                print!("{}{}", sign, change);
            }

            if !changed {
                println!("✅ Documents are equivalent");
            } else {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn read_document(validator: &Validator, path: &Path, mime: &str) -> anyhow::Result<ExportDocument> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    // Reference checks are part of validation.
    validator
        .validate(&bytes, mime)
        .with_context(|| format!("validating {}", path.display()))
}

fn normalized(exporter: &Exporter, document: &ExportDocument) -> anyhow::Result<String> {
    let mut document = document.clone();
    document.generator_version = String::new();
    for widget in &mut document.widgets {
        widget.settings = widget_transfer::canonical::canonical_settings(&widget.settings);
    }
    Ok(String::from_utf8(exporter.serialize_document(&document)?)?)
}
