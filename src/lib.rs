//! csvsilo - schema-inferring incremental CSV-to-warehouse pipeline.
//!
//! Ingests a stream of heterogeneous CSV files into a single evolving
//! analytical table. The first file fixes the canonical schema by
//! majority-vote type inference; every later file is fingerprint-checked and
//! row-validated against it, with non-conforming files and rows diverted to
//! quarantine artifacts instead of blocking the run. A durable checkpoint
//! ledger makes the batch restartable without reprocessing.

pub mod config;
pub mod discovery;
pub mod error;
pub mod inference;
pub mod loader;
pub mod orchestrator;
pub mod registry;
pub mod staging;
pub mod store;
pub mod validator;
pub mod value;

pub use config::PipelineConfig;
pub use discovery::{discover_csv_files, next_pending, CheckpointLedger};
pub use error::{PipelineError, Result};
pub use inference::{infer_storage_type, StorageType};
pub use loader::{load_rows, LoadReport};
pub use orchestrator::{FileOutcome, FileState, Pipeline, RunSummary};
pub use registry::{column_fingerprint, CommittedColumn, SchemaRegistry, SchemaRegistryEntry};
pub use staging::{stage_file, StagedDataset};
pub use store::{SqliteStore, WarehouseStore};
pub use validator::{validate_rows, RejectedRow, TypedRow, ValidationOutcome};
pub use value::CellValue;
