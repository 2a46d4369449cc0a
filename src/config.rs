//! Pipeline configuration.
//!
//! One `PipelineConfig` value is constructed at process start (CLI args plus
//! environment) and passed explicitly into every component. There is no
//! module-global state.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Default identity of the single evolving warehouse table.
pub const DEFAULT_TABLE_NAME: &str = "main_data_table";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory scanned for input CSV files.
    pub data_dir: PathBuf,

    /// Directory receiving staged copies (`staged_<filename>`).
    pub stage_dir: PathBuf,

    /// Directory receiving quarantine artifacts (`error_<stem>.csv`).
    pub error_dir: PathBuf,

    /// Append-only ledger of completed filenames.
    pub checkpoint_path: PathBuf,

    /// Persisted schema registry document.
    pub registry_path: PathBuf,

    /// SQLite warehouse database file.
    pub store_path: PathBuf,

    /// Identity of the warehouse table committed by the first file.
    pub table_name: String,
}

impl PipelineConfig {
    /// Standard layout rooted at a base working directory.
    pub fn from_base_dir(base: &Path) -> Self {
        Self {
            data_dir: base.join("data"),
            stage_dir: base.join("stage"),
            error_dir: base.join("error_files"),
            checkpoint_path: base.join("checkpoint.txt"),
            registry_path: base.join("table_map.json"),
            store_path: base.join("warehouse.db"),
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Create the working directories the pipeline writes into.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.stage_dir, &self.error_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let config = PipelineConfig::from_base_dir(Path::new("/tmp/pipeline"));
        assert_eq!(config.data_dir, Path::new("/tmp/pipeline/data"));
        assert_eq!(config.checkpoint_path, Path::new("/tmp/pipeline/checkpoint.txt"));
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
    }
}
