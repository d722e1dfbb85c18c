//! bibnote CLI tool
//!
//! Keeps the bibliographies and notes documents listed in `config.yml` in sync.
//!
//! ## Commands
//!
//! - `watch` (default): sync on every change until Ctrl-C
//! - `to-doc`: add missing sections to every document once
//! - `to-bib`: write notes back into every bibliography once
//! - `init`: generate missing documents from their templates
//! - `add <bib> <md> [--template <path>]`: add a sync pair to the config file

use bibnote_core::{
    config::{ConfigProvider, FileConfigProvider, PairRecord, DEFAULT_CONFIG_FILE},
    event::Event,
    watch::SyncService,
    BibnoteError,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::mpsc::channel, time::Duration};

#[derive(Parser)]
#[command(name = "bibnote")]
#[command(author, version, about = "Sync BibTeX comments with a markdown notes document", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch every configured pair and sync on change
    Watch,

    /// Add sections for new bibliography entries, once
    ToDoc,

    /// Copy section notes into bibliography comments, once
    ToBib,

    /// Generate documents that do not exist yet
    Init,

    /// Add a sync pair to the configuration file
    Add {
        /// Bibliography path, relative to the config file
        bib: String,

        /// Notes document path, relative to the config file
        md: String,

        /// Document template path, relative to the config file
        #[arg(short, long)]
        template: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let provider = FileConfigProvider::new(cli.config);

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&provider)?,

        Commands::ToDoc => {
            for pair in provider.get_pairs()? {
                let report = pair.converter().bibliography_to_document()?;
                println!(
                    "{}: {} inserted, {} skipped",
                    pair.doc.display(),
                    report.inserted.len(),
                    report.skipped.len()
                );
            }
        }

        Commands::ToBib => {
            for pair in provider.get_pairs()? {
                let report = pair.converter().document_to_bibliography()?;
                println!(
                    "{}: {} updated, {} without section, {} orphaned",
                    pair.bib.display(),
                    report.updated.len(),
                    report.missing_sections.len(),
                    report.orphaned_sections.len()
                );
            }
        }

        Commands::Init => {
            for pair in provider.get_pairs()? {
                let report = pair.converter().initialize_document()?;
                if report.generated {
                    println!(
                        "{}: generated with {} section(s)",
                        pair.doc.display(),
                        report.inserted.len()
                    );
                } else {
                    println!("{}: exists, left alone", pair.doc.display());
                }
            }
        }

        Commands::Add { bib, md, template } => {
            provider.add_pair(PairRecord { bib, md, template })?;
            println!("Added pair to {}", provider.path().display());
        }
    }

    Ok(())
}

fn watch(provider: &FileConfigProvider) -> Result<(), BibnoteError> {
    // Create event channel
    let (tx, rx) = channel::<Event>();

    // Spawn event handler thread
    let event_handle = std::thread::spawn(move || {
        for event in rx {
            match event {
                Event::Synced { pair, report } => println!("[Event] {pair:?}: {report:?}"),
                Event::SyncFailed { pair, error, .. } => eprintln!("[Event] {pair:?}: {error}"),
                other => println!("[Event] {other}"),
            }
        }
    });

    let service = SyncService::with_debounce(Some(tx), provider.get_debounce()?);
    let pairs = service.enable_config(provider)?;
    println!(
        "Watching {} sync pair(s). Press Ctrl-C to stop.",
        pairs.len()
    );

    // Set up Ctrl-C handler
    let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        r.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|e| BibnoteError::Custom(format!("could not install Ctrl-C handler: {e}")))?;

    // Keep running until Ctrl-C
    while running.load(std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    // Cleanup; dropping the service closes the event channel
    service.shutdown();
    drop(service);
    event_handle.join().ok();

    println!("Shutdown complete");
    Ok(())
}
