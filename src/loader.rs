//! Loader: surrogate-ID allocation and the per-file bulk insert.
//!
//! The ID high-watermark is reread from the store before every file rather
//! than trusted from memory, so allocation stays correct across restarts and
//! across files. IDs are contiguous from max+1 in validated row order.

use crate::error::Result;
use crate::registry::SchemaRegistryEntry;
use crate::store::WarehouseStore;
use crate::validator::TypedRow;
use crate::value::CellValue;
use tracing::info;

/// Counts reported back to the orchestrator after one file's load step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadReport {
    pub table_name: String,
    pub rows_loaded: usize,
    pub rows_rejected: usize,
}

/// Load the valid rows of one file in a single bulk insert.
///
/// A failure here is an infrastructure error: row formats were already
/// guaranteed by validation.
pub fn load_rows(
    store: &mut dyn WarehouseStore,
    entry: &SchemaRegistryEntry,
    valid: Vec<TypedRow>,
    rows_rejected: usize,
) -> Result<LoadReport> {
    if valid.is_empty() {
        return Ok(LoadReport {
            table_name: entry.table_name.clone(),
            rows_loaded: 0,
            rows_rejected,
        });
    }

    let last_id = store.max_surrogate_id(&entry.table_name)?;

    let mut columns = Vec::with_capacity(entry.columns.len() + 1);
    columns.push("id".to_string());
    columns.extend(entry.columns.iter().map(|c| c.name.clone()));

    let rows: Vec<Vec<CellValue>> = valid
        .into_iter()
        .enumerate()
        .map(|(offset, row)| {
            let mut values = Vec::with_capacity(row.values.len() + 1);
            values.push(CellValue::Integer(last_id + 1 + offset as i64));
            values.extend(row.values);
            values
        })
        .collect();

    let rows_loaded = store.insert_rows(&entry.table_name, &columns, &rows)?;
    info!(
        table = %entry.table_name,
        rows_loaded,
        rows_rejected,
        first_id = last_id + 1,
        "load complete"
    );

    Ok(LoadReport {
        table_name: entry.table_name.clone(),
        rows_loaded,
        rows_rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::StorageType;
    use crate::registry::{column_fingerprint, CommittedColumn};
    use crate::store::SqliteStore;

    fn entry() -> SchemaRegistryEntry {
        SchemaRegistryEntry {
            table_name: "t".to_string(),
            fingerprint: column_fingerprint(&["v"]),
            columns: vec![CommittedColumn {
                name: "v".to_string(),
                storage_type: StorageType::Int,
            }],
        }
    }

    fn typed(values: &[i64]) -> Vec<TypedRow> {
        values
            .iter()
            .map(|v| TypedRow {
                values: vec![CellValue::Integer(*v)],
            })
            .collect()
    }

    #[test]
    fn test_ids_start_at_one_on_empty_table() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &entry().columns).unwrap();

        let report = load_rows(&mut store, &entry(), typed(&[10, 20, 30]), 0).unwrap();
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(store.max_surrogate_id("t").unwrap(), 3);
    }

    #[test]
    fn test_ids_continue_from_store_maximum() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &entry().columns).unwrap();

        load_rows(&mut store, &entry(), typed(&[1, 2]), 0).unwrap();
        load_rows(&mut store, &entry(), typed(&[3]), 0).unwrap();
        assert_eq!(store.max_surrogate_id("t").unwrap(), 3);
    }

    #[test]
    fn test_zero_valid_rows_skips_insert() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &entry().columns).unwrap();

        let report = load_rows(&mut store, &entry(), Vec::new(), 4).unwrap();
        assert_eq!(report.rows_loaded, 0);
        assert_eq!(report.rows_rejected, 4);
        assert_eq!(store.max_surrogate_id("t").unwrap(), 0);
    }
}
