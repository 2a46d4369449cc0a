//! Staging pass: read a raw CSV, clean its column names, drop duplicate rows,
//! and replace missing values with the explicit `NULL` sentinel. A staged
//! copy is written next to the pipeline's working state for inspection.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::value::{is_null_token, NULL_SENTINEL};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A dataset after staging. Rows are untyped strings; column names are
/// cleaned and de-duplicated; every cell is non-empty (missing values carry
/// the sentinel).
#[derive(Clone, Debug)]
pub struct StagedDataset {
    /// Original input filename, used for quarantine naming and checkpoints.
    pub source_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StagedDataset {
    /// Non-null sample values of one column, by index.
    pub fn column_sample(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).map(String::as_str))
            .filter(|v| !is_null_token(v))
            .collect()
    }
}

/// Cheap readability probe before staging: headers plus the first few
/// records must parse.
pub fn probe_file(path: &Path) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| PipelineError::Discovery(format!("{}: {e}", path.display())))?;

    reader
        .headers()
        .map_err(|e| PipelineError::Staging(format!("{}: {e}", path.display())))?;

    for record in reader.records().take(3) {
        record.map_err(|e| PipelineError::Staging(format!("{}: {e}", path.display())))?;
    }
    Ok(())
}

/// Clean one column name: trim, lowercase, separators to underscores,
/// parentheses stripped.
pub fn clean_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace([' ', '.'], "_")
        .replace(['(', ')'], "")
}

/// Clean all names, then de-duplicate collisions with numeric suffixes.
pub fn clean_column_names(names: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut cleaned = Vec::with_capacity(names.len());
    for name in names {
        let base = clean_column_name(name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        cleaned.push(candidate);
    }
    cleaned
}

/// Read, clean, de-duplicate and null-fill one input file, writing the
/// staged artifact `staged_<filename>` into the stage directory.
pub fn stage_file(config: &PipelineConfig, filename: &str) -> Result<StagedDataset> {
    let src = config.data_dir.join(filename);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&src)
        .map_err(|e| PipelineError::Staging(format!("{filename}: {e}")))?;

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::Staging(format!("{filename}: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = clean_column_names(&raw_headers);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut duplicates_removed = 0usize;
    let mut nulls_filled = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::Staging(format!("{filename}: {e}")))?;
        let mut row = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let cell = record.get(idx).unwrap_or("");
            if is_null_token(cell) {
                nulls_filled += 1;
                row.push(NULL_SENTINEL.to_string());
            } else {
                row.push(cell.trim().to_string());
            }
        }
        if seen.insert(row.clone()) {
            rows.push(row);
        } else {
            duplicates_removed += 1;
        }
    }

    let staged = StagedDataset {
        source_name: filename.to_string(),
        columns,
        rows,
    };
    let artifact = write_staged_artifact(config, &staged)?;

    info!(
        file = filename,
        rows = staged.rows.len(),
        columns = staged.columns.len(),
        duplicates_removed,
        nulls_filled,
        artifact = %artifact.display(),
        "staged"
    );
    Ok(staged)
}

fn write_staged_artifact(config: &PipelineConfig, staged: &StagedDataset) -> Result<PathBuf> {
    let path = config.stage_dir.join(format!("staged_{}", staged.source_name));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&staged.columns)?;
    for row in &staged.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    debug!(artifact = %path.display(), "staged artifact written");
    Ok(path)
}
