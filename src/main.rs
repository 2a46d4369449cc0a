use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csvsilo::{
    discover_csv_files, CheckpointLedger, Pipeline, PipelineConfig, SchemaRegistry, SqliteStore,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "csvsilo")]
#[command(about = "Schema-inferring incremental CSV to warehouse pipeline")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process all pending CSV files in filename order
    Run {
        /// Base working directory (stage, quarantine, checkpoint, registry)
        #[arg(short, long, default_value = ".")]
        work_dir: PathBuf,

        /// Input directory of CSV files (default: <work_dir>/data)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Warehouse database file (default: <work_dir>/warehouse.db)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Show pending and completed files plus the committed schema
    Status {
        /// Base working directory
        #[arg(short, long, default_value = ".")]
        work_dir: PathBuf,

        /// Input directory of CSV files (default: <work_dir>/data)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn build_config(work_dir: &Path, data_dir: Option<PathBuf>, store: Option<PathBuf>) -> PipelineConfig {
    let mut config = PipelineConfig::from_base_dir(work_dir);
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    } else if let Ok(dir) = std::env::var("CSVSILO_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(path) = store {
        config.store_path = path;
    } else if let Ok(path) = std::env::var("CSVSILO_STORE") {
        config.store_path = PathBuf::from(path);
    }
    config
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run {
            work_dir,
            data_dir,
            store,
        } => {
            let config = build_config(&work_dir, data_dir, store);
            config
                .ensure_directories()
                .context("Failed to create working directories")?;
            let store =
                SqliteStore::open(&config.store_path).context("Failed to open warehouse store")?;
            let mut pipeline = Pipeline::new(config, Box::new(store))
                .context("Failed to initialize pipeline")?;

            match pipeline.run() {
                Ok(summary) => {
                    info!(
                        files_committed = summary.files_committed,
                        files_schema_quarantined = summary.files_schema_quarantined,
                        rows_loaded = summary.rows_loaded,
                        rows_quarantined = summary.rows_quarantined,
                        "pipeline finished"
                    );
                    println!(
                        "Committed {} file(s), schema-quarantined {} file(s), loaded {} row(s), quarantined {} row(s)",
                        summary.files_committed,
                        summary.files_schema_quarantined,
                        summary.rows_loaded,
                        summary.rows_quarantined
                    );
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "pipeline halted; rerun to retry pending files");
                    std::process::exit(1);
                }
            }
        }
        Commands::Status { work_dir, data_dir } => {
            let config = build_config(&work_dir, data_dir, None);
            let ledger = CheckpointLedger::load(&config.checkpoint_path)
                .context("Failed to load checkpoint ledger")?;
            let files = discover_csv_files(&config.data_dir).unwrap_or_default();

            let registry = SchemaRegistry::load(&config.registry_path)
                .context("Failed to load schema registry")?;
            match registry.entry() {
                Some(entry) => {
                    println!("Table: {}", entry.table_name);
                    println!("Fingerprint: {}", entry.fingerprint);
                    for column in &entry.columns {
                        println!("  {} {}", column.name, column.storage_type);
                    }
                }
                None => println!("No schema committed yet"),
            }

            println!("\nFiles:");
            for file in &files {
                let mark = if ledger.contains(file) { "done" } else { "pending" };
                println!("  {file:40} {mark}");
            }
            if files.is_empty() {
                println!("  (none found in {})", config.data_dir.display());
            }

            // Checkpointed files that have since left the input directory.
            let gone: Vec<&String> = ledger
                .completed()
                .iter()
                .filter(|name| !files.contains(name))
                .collect();
            if !gone.is_empty() {
                println!("\nCheckpointed but no longer present:");
                for name in gone {
                    println!("  {name}");
                }
            }
            Ok(())
        }
    }
}
