//! Orchestrator: the per-file state machine and the sequential run loop.
//!
//! Files advance through
//! `Discovered → Staged → {SchemaMatched | SchemaMismatched} → {Loaded |
//! LoadInfraFailed} → Checkpointed`, strictly one file at a time in
//! ascending filename order. Decisions made by file N (schema commit, ID
//! high-watermark) are read back as committed fact by file N+1.

use crate::config::PipelineConfig;
use crate::discovery::{next_pending, CheckpointLedger};
use crate::error::{PipelineError, Result};
use crate::inference::infer_storage_type;
use crate::loader::load_rows;
use crate::registry::{column_fingerprint, CommittedColumn, SchemaRegistry, SchemaRegistryEntry};
use crate::staging::{probe_file, stage_file, StagedDataset};
use crate::store::WarehouseStore;
use crate::validator::{validate_rows, write_quarantine_artifact};
use tracing::{debug, error, info, warn};

/// Lifecycle of one input file within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    Staged,
    SchemaMatched,
    SchemaMismatched,
    Loaded,
    LoadInfraFailed,
    Checkpointed,
}

/// Final outcome of one file, returned explicitly instead of being encoded
/// in raised errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// Every row loaded.
    Committed { rows_loaded: usize },
    /// Some rows quarantined, the remainder loaded. Still a completed file.
    RowsPartiallyQuarantined {
        rows_loaded: usize,
        rows_rejected: usize,
    },
    /// Fingerprint mismatch: the whole file diverted, zero rows loaded,
    /// checkpointed so it is never retried.
    SchemaQuarantined { rows_diverted: usize },
    /// Store unreachable or bulk insert rejected for non-data reasons. The
    /// file stays pending and the run halts.
    InfrastructureFailure { detail: String },
}

/// End-of-run counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_committed: usize,
    pub files_schema_quarantined: usize,
    pub rows_loaded: usize,
    pub rows_quarantined: usize,
}

/// The pipeline: configuration, persisted registry and ledger, and the
/// warehouse store. Single writer; every store interaction is a synchronous
/// blocking call.
pub struct Pipeline {
    config: PipelineConfig,
    registry: SchemaRegistry,
    ledger: CheckpointLedger,
    store: Box<dyn WarehouseStore>,
}

impl Pipeline {
    /// Load persisted state (registry document, checkpoint ledger) and
    /// prepare the working directories.
    pub fn new(config: PipelineConfig, store: Box<dyn WarehouseStore>) -> Result<Self> {
        config.ensure_directories()?;
        let registry = SchemaRegistry::load(&config.registry_path)?;
        let ledger = CheckpointLedger::load(&config.checkpoint_path)?;
        Ok(Self {
            config,
            registry,
            ledger,
            store,
        })
    }

    pub fn ledger(&self) -> &CheckpointLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Process every pending file in filename order until none remain.
    ///
    /// Data problems never stop the run; infrastructure problems halt it
    /// with the offending file left pending for the next invocation.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            let Some(filename) = next_pending(&self.config.data_dir, &self.ledger)? else {
                break;
            };
            info!(file = %filename, "processing");
            match self.process_file(&filename)? {
                FileOutcome::Committed { rows_loaded } => {
                    summary.files_committed += 1;
                    summary.rows_loaded += rows_loaded;
                }
                FileOutcome::RowsPartiallyQuarantined {
                    rows_loaded,
                    rows_rejected,
                } => {
                    summary.files_committed += 1;
                    summary.rows_loaded += rows_loaded;
                    summary.rows_quarantined += rows_rejected;
                }
                FileOutcome::SchemaQuarantined { .. } => {
                    summary.files_schema_quarantined += 1;
                }
                FileOutcome::InfrastructureFailure { detail } => {
                    error!(
                        file = %filename,
                        %detail,
                        "infrastructure failure; halting run, file left pending"
                    );
                    return Err(PipelineError::Store(detail));
                }
            }
        }
        info!(
            files_committed = summary.files_committed,
            files_schema_quarantined = summary.files_schema_quarantined,
            rows_loaded = summary.rows_loaded,
            rows_quarantined = summary.rows_quarantined,
            "run complete"
        );
        Ok(summary)
    }

    /// Drive one file through the state machine.
    pub fn process_file(&mut self, filename: &str) -> Result<FileOutcome> {
        let mut state = FileState::Discovered;
        debug!(file = filename, ?state, "transition");

        probe_file(&self.config.data_dir.join(filename))?;
        let dataset = stage_file(&self.config, filename)?;
        state = FileState::Staged;
        debug!(file = filename, ?state, "transition");

        // Schema check happens on cleaned column names only, before any type
        // inference or row inspection.
        let entry = if let Some(committed) = self.registry.entry().cloned() {
            if !self.registry.matches(&dataset.columns) {
                return self.quarantine_whole_file(filename, &dataset);
            }
            state = FileState::SchemaMatched;
            debug!(file = filename, ?state, "transition");

            // Heal a registry that points at a table the store lost.
            if let Err(e) = self.registry.ensure_table(self.store.as_mut()) {
                return Ok(infra_failure(&mut state, filename, e));
            }
            committed
        } else {
            let entry = match self.commit_first_schema(&dataset) {
                Ok(entry) => entry,
                Err(e @ PipelineError::Store(_)) => {
                    return Ok(infra_failure(&mut state, filename, e));
                }
                Err(e) => return Err(e),
            };
            state = FileState::SchemaMatched;
            debug!(file = filename, ?state, "transition");
            entry
        };

        // Row validation: the first failing column rejects the row; the
        // valid remainder proceeds. Rejection never changes the file's fate.
        let outcome = validate_rows(&dataset, &entry)?;
        let rows_rejected = outcome.rejected.len();
        if rows_rejected > 0 {
            let rejected_rows: Vec<Vec<String>> =
                outcome.rejected.iter().map(|r| r.values.clone()).collect();
            write_quarantine_artifact(&self.config, filename, &dataset.columns, &rejected_rows)?;
        }

        let report = match load_rows(self.store.as_mut(), &entry, outcome.valid, rows_rejected) {
            Ok(report) => report,
            Err(e @ PipelineError::Store(_)) => {
                return Ok(infra_failure(&mut state, filename, e));
            }
            Err(e) => return Err(e),
        };
        state = FileState::Loaded;
        debug!(file = filename, ?state, "transition");

        // Checkpoint happens-after the load's durable commit, never before.
        self.ledger.mark_done(filename)?;
        state = FileState::Checkpointed;
        debug!(file = filename, ?state, "transition");

        if report.rows_rejected > 0 {
            Ok(FileOutcome::RowsPartiallyQuarantined {
                rows_loaded: report.rows_loaded,
                rows_rejected: report.rows_rejected,
            })
        } else {
            Ok(FileOutcome::Committed {
                rows_loaded: report.rows_loaded,
            })
        }
    }

    /// First contact: infer the type map over this file's columns, create
    /// the table, and persist the canonical schema. First file wins.
    fn commit_first_schema(&mut self, dataset: &StagedDataset) -> Result<SchemaRegistryEntry> {
        let columns: Vec<CommittedColumn> = dataset
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let storage_type = infer_storage_type(&dataset.column_sample(idx));
                debug!(column = %name, %storage_type, "inferred");
                CommittedColumn {
                    name: name.clone(),
                    storage_type,
                }
            })
            .collect();

        let entry = SchemaRegistryEntry {
            table_name: self.config.table_name.clone(),
            fingerprint: column_fingerprint(&dataset.columns),
            columns,
        };
        self.store.create_table(&entry.table_name, &entry.columns)?;
        self.registry.commit(entry.clone())?;
        Ok(entry)
    }

    /// Total schema mismatch: divert the whole file to quarantine and
    /// checkpoint it. The file is never retried; operators reprocess by
    /// dropping a corrected copy under a new name.
    fn quarantine_whole_file(
        &mut self,
        filename: &str,
        dataset: &StagedDataset,
    ) -> Result<FileOutcome> {
        let state = FileState::SchemaMismatched;
        debug!(file = filename, ?state, "transition");

        let canonical = self
            .registry
            .entry()
            .map(|e| e.fingerprint.clone())
            .unwrap_or_default();
        warn!(
            file = filename,
            canonical = %canonical,
            got = %column_fingerprint(&dataset.columns),
            "schema mismatch; diverting whole file, zero rows will load"
        );
        write_quarantine_artifact(&self.config, filename, &dataset.columns, &dataset.rows)?;

        self.ledger.mark_done(filename)?;
        let state = FileState::Checkpointed;
        debug!(file = filename, ?state, "transition");

        Ok(FileOutcome::SchemaQuarantined {
            rows_diverted: dataset.rows.len(),
        })
    }
}

fn infra_failure(state: &mut FileState, filename: &str, err: PipelineError) -> FileOutcome {
    *state = FileState::LoadInfraFailed;
    error!(file = filename, state = ?state, error = %err, "load infrastructure failure");
    FileOutcome::InfrastructureFailure {
        detail: err.to_string(),
    }
}
