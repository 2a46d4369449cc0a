//! Schema Registry.
//!
//! The first file to complete staging commits the canonical column set and
//! the inferred type map; both are persisted and never updated afterwards.
//! Every later file is reduced to a fingerprint of its cleaned column names
//! and compared against the canonical fingerprint before any row is looked
//! at.

use crate::error::{PipelineError, Result};
use crate::inference::StorageType;
use crate::store::WarehouseStore;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One committed column: cleaned name plus the storage type the first file's
/// sample voted for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedColumn {
    pub name: String,
    pub storage_type: StorageType,
}

/// The persisted registry document. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistryEntry {
    /// Warehouse table identity.
    pub table_name: String,
    /// Canonical fingerprint of the cleaned column set.
    pub fingerprint: String,
    /// Committed columns in the first file's order.
    pub columns: Vec<CommittedColumn>,
}

/// Registry handle: loads the persisted document at the start of every run,
/// writes it exactly once at first-file commit.
pub struct SchemaRegistry {
    path: PathBuf,
    entry: Option<SchemaRegistryEntry>,
}

/// Deterministic, order-independent fingerprint of a cleaned column set.
pub fn column_fingerprint<S: AsRef<str>>(columns: &[S]) -> String {
    columns.iter().map(|c| c.as_ref()).sorted().join("|")
}

impl SchemaRegistry {
    /// Load the registry document if one exists; a missing file means no
    /// schema has been committed yet.
    pub fn load(path: &Path) -> Result<Self> {
        let entry = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let entry: SchemaRegistryEntry = serde_json::from_str(&content)
                .map_err(|e| PipelineError::Registry(format!("{}: {e}", path.display())))?;
            info!(
                table = %entry.table_name,
                fingerprint = %entry.fingerprint,
                "schema registry loaded"
            );
            Some(entry)
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            entry,
        })
    }

    pub fn entry(&self) -> Option<&SchemaRegistryEntry> {
        self.entry.as_ref()
    }

    /// Whether a cleaned column set matches the canonical schema.
    ///
    /// Compares the sorted name sets directly rather than the joined
    /// fingerprint strings: the `|` separator is legal inside a cleaned
    /// column name, so two different column sets can render the same
    /// fingerprint. The fingerprint stays the persisted, human-readable key;
    /// matching must not inherit its collisions.
    pub fn matches<S: AsRef<str>>(&self, columns: &[S]) -> bool {
        let Some(entry) = &self.entry else {
            return false;
        };
        let mut got: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
        got.sort_unstable();
        let mut committed: Vec<&str> = entry.columns.iter().map(|c| c.name.as_str()).collect();
        committed.sort_unstable();
        got == committed
    }

    /// Commit the canonical schema. First file wins; committing twice is a
    /// registry error.
    pub fn commit(&mut self, entry: SchemaRegistryEntry) -> Result<()> {
        if self.entry.is_some() {
            return Err(PipelineError::Registry(
                "schema already committed; the canonical schema is immutable".to_string(),
            ));
        }
        let content = serde_json::to_string_pretty(&entry)?;
        std::fs::write(&self.path, content)?;
        info!(
            table = %entry.table_name,
            fingerprint = %entry.fingerprint,
            columns = entry.columns.len(),
            "canonical schema committed"
        );
        self.entry = Some(entry);
        Ok(())
    }

    /// Self-heal: if the registry references a table the store no longer
    /// has, recreate it from the persisted type map. No re-inference; ID
    /// continuation naturally resets to zero with the empty table.
    pub fn ensure_table(&self, store: &mut dyn WarehouseStore) -> Result<()> {
        let Some(entry) = &self.entry else {
            return Ok(());
        };
        if !store.table_exists(&entry.table_name)? {
            warn!(
                table = %entry.table_name,
                "registry references a missing table; recreating from persisted type map"
            );
            store.create_table(&entry.table_name, &entry.columns)?;
        }
        Ok(())
    }
}
