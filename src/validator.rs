//! Row Validator & Quarantine.
//!
//! Runs only when a file's column set matches the canonical schema. Each
//! row is converted cell by cell against the committed types; the first
//! failing column rejects the whole row. Rejected rows keep their original
//! untyped layout and are written to a quarantine artifact named after the
//! source file. Rejection never blocks the valid remainder.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::inference::StorageType;
use crate::registry::SchemaRegistryEntry;
use crate::staging::StagedDataset;
use crate::value::{
    is_null_token, parse_boolean, parse_date, parse_datetime, parse_float, parse_integer,
    CellValue,
};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A row that conforms to the committed schema: one typed cell per committed
/// column, in committed column order.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedRow {
    pub values: Vec<CellValue>,
}

/// A rejected row in its original untyped layout, with the offending column
/// and a short reason.
#[derive(Clone, Debug)]
pub struct RejectedRow {
    pub values: Vec<String>,
    pub column: String,
    pub reason: String,
}

/// Split of one staged dataset into loadable and rejected rows. Valid rows
/// keep their original relative order.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<TypedRow>,
    pub rejected: Vec<RejectedRow>,
}

/// Validate every staged row against the committed schema.
///
/// The fingerprint is order-independent, so the dataset's column order may
/// differ from the committed order; cells are looked up by committed name.
/// A committed column absent from the dataset is a registry error, not a
/// row rejection.
pub fn validate_rows(
    dataset: &StagedDataset,
    entry: &SchemaRegistryEntry,
) -> Result<ValidationOutcome> {
    let indices: Vec<usize> = entry
        .columns
        .iter()
        .map(|c| {
            dataset
                .columns
                .iter()
                .position(|name| name == &c.name)
                .ok_or_else(|| {
                    PipelineError::Registry(format!(
                        "committed column '{}' missing from {}",
                        c.name, dataset.source_name
                    ))
                })
        })
        .collect::<Result<_>>()?;

    let mut outcome = ValidationOutcome::default();
    for row in &dataset.rows {
        match type_row(row, entry, &indices) {
            Ok(typed) => outcome.valid.push(typed),
            Err((column, reason)) => {
                if outcome.rejected.len() < 5 {
                    warn!(file = %dataset.source_name, column = %column, %reason, "row rejected");
                }
                outcome.rejected.push(RejectedRow {
                    values: row.clone(),
                    column,
                    reason,
                });
            }
        }
    }
    Ok(outcome)
}

fn type_row(
    row: &[String],
    entry: &SchemaRegistryEntry,
    indices: &[usize],
) -> std::result::Result<TypedRow, (String, String)> {
    let mut values = Vec::with_capacity(entry.columns.len());
    for (column, &idx) in entry.columns.iter().zip(indices) {
        let raw = row.get(idx).map(String::as_str).unwrap_or("");
        match type_cell(raw, column.storage_type) {
            Some(value) => values.push(value),
            None => {
                let reason = format!("expected {}, got '{raw}'", column.storage_type);
                return Err((column.name.clone(), reason));
            }
        }
    }
    Ok(TypedRow { values })
}

/// Total conversion of one cell against a committed type. Null and the
/// staging sentinel become `Null` unconditionally.
pub fn type_cell(raw: &str, storage_type: StorageType) -> Option<CellValue> {
    if is_null_token(raw) {
        return Some(CellValue::Null);
    }
    match storage_type {
        t if t.is_integer() => parse_integer(raw).map(CellValue::Integer),
        StorageType::Double => parse_float(raw).map(CellValue::Float),
        StorageType::Boolean => parse_boolean(raw).map(CellValue::Boolean),
        StorageType::Date => parse_date(raw).map(CellValue::Date),
        StorageType::DateTime => parse_datetime(raw).map(CellValue::DateTime),
        StorageType::Varchar(_) => Some(CellValue::Text(raw.to_string())),
        _ => unreachable!("integer tiers handled by guard"),
    }
}

/// Write a quarantine artifact: `error_<stem>.csv` in the error directory,
/// rows in their original untyped layout, no surrogate ID.
pub fn write_quarantine_artifact(
    config: &PipelineConfig,
    source_name: &str,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    let path = config.error_dir.join(quarantine_filename(source_name));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    warn!(
        file = source_name,
        rows = rows.len(),
        artifact = %path.display(),
        "quarantine artifact written"
    );
    Ok(path)
}

/// Deterministic quarantine name derived from the source filename.
pub fn quarantine_filename(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string());
    format!("error_{stem}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{column_fingerprint, CommittedColumn};

    fn entry() -> SchemaRegistryEntry {
        SchemaRegistryEntry {
            table_name: "main_data_table".to_string(),
            fingerprint: column_fingerprint(&["age", "name"]),
            columns: vec![
                CommittedColumn {
                    name: "name".to_string(),
                    storage_type: StorageType::Varchar(100),
                },
                CommittedColumn {
                    name: "age".to_string(),
                    storage_type: StorageType::TinyInt,
                },
            ],
        }
    }

    fn dataset(rows: Vec<Vec<&str>>) -> StagedDataset {
        StagedDataset {
            source_name: "people.csv".to_string(),
            columns: vec!["name".to_string(), "age".to_string()],
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    #[test]
    fn test_bad_integer_rejects_exactly_that_row() {
        let outcome = validate_rows(
            &dataset(vec![
                vec!["alice", "30"],
                vec!["bob", "abc"],
                vec!["carol", "41"],
            ]),
            &entry(),
        )
        .unwrap();
        assert_eq!(outcome.valid.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].column, "age");
        assert_eq!(outcome.rejected[0].values, vec!["bob", "abc"]);
        assert!(outcome.rejected[0].reason.contains("TINYINT"));
    }

    #[test]
    fn test_valid_rows_keep_relative_order() {
        let outcome = validate_rows(
            &dataset(vec![vec!["a", "1"], vec!["b", "x"], vec!["c", "3"]]),
            &entry(),
        )
        .unwrap();
        assert_eq!(
            outcome.valid[0].values[0],
            CellValue::Text("a".to_string())
        );
        assert_eq!(
            outcome.valid[1].values[0],
            CellValue::Text("c".to_string())
        );
    }

    #[test]
    fn test_null_sentinel_becomes_null_for_any_type() {
        let outcome = validate_rows(&dataset(vec![vec!["NULL", "NULL"]]), &entry()).unwrap();
        assert_eq!(
            outcome.valid[0].values,
            vec![CellValue::Null, CellValue::Null]
        );
    }

    #[test]
    fn test_decimal_looking_integer_passes() {
        let outcome = validate_rows(&dataset(vec![vec!["d", "5.0"]]), &entry()).unwrap();
        assert_eq!(outcome.valid[0].values[1], CellValue::Integer(5));

        let outcome = validate_rows(&dataset(vec![vec!["d", "5.7"]]), &entry()).unwrap();
        assert_eq!(outcome.valid.len(), 0);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_column_order_independent_validation() {
        // Dataset columns reversed relative to the committed order.
        let reversed = StagedDataset {
            source_name: "people.csv".to_string(),
            columns: vec!["age".to_string(), "name".to_string()],
            rows: vec![vec!["30".to_string(), "alice".to_string()]],
        };
        let outcome = validate_rows(&reversed, &entry()).unwrap();
        assert_eq!(
            outcome.valid[0].values,
            vec![
                CellValue::Text("alice".to_string()),
                CellValue::Integer(30)
            ]
        );
    }

    #[test]
    fn test_missing_committed_column_is_registry_error() {
        // One column whose name contains the fingerprint separator; neither
        // committed column exists in the dataset.
        let narrow = StagedDataset {
            source_name: "people.csv".to_string(),
            columns: vec!["name|age".to_string()],
            rows: vec![vec!["alice".to_string()]],
        };
        let err = validate_rows(&narrow, &entry()).unwrap_err();
        assert!(matches!(err, PipelineError::Registry(_)));
        assert!(err.to_string().contains("missing from people.csv"));
    }

    #[test]
    fn test_temporal_validation() {
        let entry = SchemaRegistryEntry {
            table_name: "t".to_string(),
            fingerprint: column_fingerprint(&["d"]),
            columns: vec![CommittedColumn {
                name: "d".to_string(),
                storage_type: StorageType::Date,
            }],
        };
        let ok = StagedDataset {
            source_name: "d.csv".to_string(),
            columns: vec!["d".to_string()],
            rows: vec![
                vec!["2024-02-29".to_string()],
                vec!["2023-02-29".to_string()],
            ],
        };
        let outcome = validate_rows(&ok, &entry).unwrap();
        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_quarantine_filename() {
        assert_eq!(quarantine_filename("sales_03.csv"), "error_sales_03.csv");
        assert_eq!(quarantine_filename("plain"), "error_plain.csv");
    }
}
