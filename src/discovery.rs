//! File discovery and the append-only checkpoint ledger.
//!
//! Discovery lists `*.csv` files in filename order and filters out anything
//! the ledger already records. Ledger membership is authoritative and must
//! survive restarts, so every append is flushed and fsynced before the call
//! returns.

use crate::error::{PipelineError, Result};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Durable record of fully processed filenames. Append-only: lines are never
/// rewritten or reordered.
pub struct CheckpointLedger {
    path: PathBuf,
    completed: BTreeSet<String>,
}

impl CheckpointLedger {
    pub fn load(path: &Path) -> Result<Self> {
        let completed = if path.exists() {
            std::fs::read_to_string(path)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        } else {
            BTreeSet::new()
        };
        debug!(ledger = %path.display(), completed = completed.len(), "checkpoint ledger loaded");
        Ok(Self {
            path: path.to_path_buf(),
            completed,
        })
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.completed.contains(filename)
    }

    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    /// Append one completed filename. A filename may appear at most once;
    /// marking it twice is a checkpoint error.
    pub fn mark_done(&mut self, filename: &str) -> Result<()> {
        if self.completed.contains(filename) {
            return Err(PipelineError::Checkpoint(format!(
                "{filename} is already checkpointed"
            )));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{filename}")?;
        file.sync_all()?;
        self.completed.insert(filename.to_string());
        info!(file = filename, "checkpointed");
        Ok(())
    }
}

/// All CSV files in the input directory, in ascending filename order.
pub fn discover_csv_files(data_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(data_dir)
        .map_err(|e| PipelineError::Discovery(format!("{}: {e}", data_dir.display())))?;

    let mut files: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::Discovery(e.to_string()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".csv") {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

/// The next file the pipeline has not completed, if any. Files are handed
/// out strictly one at a time in filename order.
pub fn next_pending(data_dir: &Path, ledger: &CheckpointLedger) -> Result<Option<String>> {
    let files = discover_csv_files(data_dir)?;
    Ok(files.into_iter().find(|f| !ledger.contains(f)))
}
