//! Media Catalog CLI
//!
//! Indexes a media library into a SQLite catalog and keeps it in sync.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use media_catalog::{
    CatalogRepository, FileScanOutcome, ProgressReporter, ScanConfig, ScanError, ScanOrchestrator,
    SqliteCatalog,
};

const ABOUT: &str = r#"
Media Catalog - keeps a catalog of images and videos in sync with a folder

Examples:
  media_catalog scan -r /photos                      Scan a library
  media_catalog scan -r /photos -d library.db        Use a specific catalog file
  media_catalog scan -r /photos --json               Print the summary as JSON
  media_catalog scan-file -r /photos /photos/a.jpg   Rescan one file
  media_catalog list -d library.db                   List cataloged media
"#;

/// Media library catalog
#[derive(Parser)]
#[command(name = "media_catalog")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the library and reconcile the catalog
    Scan {
        /// Library root directory
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Catalog database file
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Threads for the orphan cleanup pass (0 = auto)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Do not rename files with uppercase extensions
        #[arg(long)]
        no_normalize: bool,

        /// Do not print progress lines to stderr
        #[arg(long)]
        quiet: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile a single file with the catalog
    ScanFile {
        /// File to rescan
        path: PathBuf,

        /// Library root directory
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Catalog database file
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cataloged media
    List {
        /// Catalog database file
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_catalog(config: &ScanConfig) -> Result<Arc<SqliteCatalog>, ScanError> {
    let path = config.effective_db_path();
    info!("Opening catalog {:?}", path);
    Ok(Arc::new(SqliteCatalog::open(&path)?))
}

fn absolute(path: PathBuf) -> Result<PathBuf, ScanError> {
    std::fs::canonicalize(&path).map_err(|e| ScanError::file_access(path, e.to_string()))
}

fn run_scan(config: ScanConfig, json: bool) -> Result<(), ScanError> {
    let catalog = open_catalog(&config)?;
    let reporter = Arc::new(ProgressReporter::new(
        config.show_progress,
        config.progress_interval_ms,
    ));
    let root = config.library_root.clone();

    let orchestrator = ScanOrchestrator::builder(catalog)
        .config(config)
        .sink(reporter)
        .build();
    let summary = orchestrator.start_scan(root)?.wait()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    } else {
        println!("Scan completed:");
        println!("  Added: {}", summary.added);
        println!("  Updated: {}", summary.updated);
        println!("  Removed: {}", summary.removed);
        println!("  Total: {}", summary.total);
    }
    Ok(())
}

fn run_scan_file(config: ScanConfig, path: PathBuf, json: bool) -> Result<(), ScanError> {
    let catalog = open_catalog(&config)?;
    let orchestrator = ScanOrchestrator::builder(catalog).config(config).build();

    let outcome = orchestrator.scan_file(absolute(path)?)?;
    match &outcome {
        FileScanOutcome::Failed(e) => return Err(e.clone()),
        _ if json => {
            let json = serde_json::json!({
                "outcome": outcome.as_str(),
                "record": outcome.record(),
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        _ => {
            if let Some(record) = outcome.record() {
                println!("{}: {} (id {})", outcome.as_str(), record.relative_path, record.id);
            }
        }
    }
    Ok(())
}

fn run_list(config: ScanConfig, json: bool) -> Result<(), ScanError> {
    let catalog = open_catalog(&config)?;
    let records = catalog.list_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records).unwrap_or_default());
        return Ok(());
    }
    for record in &records {
        let path = if record.is_legacy() {
            "<no relative path>"
        } else {
            record.relative_path.as_str()
        };
        println!(
            "{:>6}  {:<5}  {:>12}  {}",
            record.id,
            record.kind.as_str(),
            record.size_bytes,
            path
        );
    }
    println!("{} records", records.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Scan {
            root,
            db,
            threads,
            no_normalize,
            quiet,
            json,
        }) => absolute(root).and_then(|root| {
            let mut builder = ScanConfig::builder()
                .library_root(root)
                .num_threads(threads)
                .normalize_extensions(!no_normalize)
                .show_progress(!quiet);
            if let Some(db) = db {
                builder = builder.db_path(db);
            }
            run_scan(builder.build(), json)
        }),
        Some(Commands::ScanFile {
            path,
            root,
            db,
            json,
        }) => absolute(root).and_then(|root| {
            let mut builder = ScanConfig::builder().library_root(root);
            if let Some(db) = db {
                builder = builder.db_path(db);
            }
            run_scan_file(builder.build(), path, json)
        }),
        Some(Commands::List { db, json }) => {
            let mut config = ScanConfig::default();
            config.db_path = db;
            run_list(config, json)
        }
        None => {
            println!("{}", ABOUT);
            println!("Run 'media_catalog --help' for all options");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
