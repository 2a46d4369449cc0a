//! Warehouse store contract and the SQLite-backed implementation.
//!
//! The store is the sole source of truth for both the committed table and
//! the surrogate-ID high-watermark. The table follows an append model: a
//! leading `id BIGINT NOT NULL` identity column, no primary-key
//! deduplication.

use crate::error::Result;
use crate::registry::CommittedColumn;
use crate::value::CellValue;
use rusqlite::types::{Null, ToSqlOutput};
use rusqlite::{Connection, ToSql};
use std::path::Path;
use tracing::{debug, info};

/// Synchronous store contract: table creation with explicit per-column
/// types, a maximum-value query on the identity column, and bulk insert.
pub trait WarehouseStore {
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create the table with a leading surrogate identity column followed by
    /// the committed columns.
    fn create_table(&mut self, table: &str, columns: &[CommittedColumn]) -> Result<()>;

    /// Current maximum surrogate ID, 0 for an empty or fresh table.
    fn max_surrogate_id(&self, table: &str) -> Result<i64>;

    /// One bulk insert covering all rows, atomically. `columns` names the
    /// target columns in row value order (surrogate ID included).
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<usize>;
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::from(Null),
            CellValue::Integer(i) => ToSqlOutput::from(*i),
            CellValue::Float(f) => ToSqlOutput::from(*f),
            CellValue::Boolean(b) => ToSqlOutput::from(*b),
            CellValue::Text(s) => ToSqlOutput::from(s.as_str()),
            CellValue::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            CellValue::DateTime(dt) => {
                ToSqlOutput::from(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        })
    }
}

/// Embedded SQLite warehouse. SQLite accepts the warehouse DDL type names
/// verbatim, so the committed types appear unchanged in the schema.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!(store = %path.display(), "warehouse store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl WarehouseStore for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_table(&mut self, table: &str, columns: &[CommittedColumn]) -> Result<()> {
        let mut defs = vec![format!("{} BIGINT NOT NULL", quote_ident("id"))];
        for column in columns {
            defs.push(format!(
                "{} {}",
                quote_ident(&column.name),
                column.storage_type.ddl()
            ));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(table),
            defs.join(",\n    ")
        );
        self.conn.execute(&sql, [])?;
        info!(table, columns = columns.len(), "table created");
        Ok(())
    }

    fn max_surrogate_id(&self, table: &str) -> Result<i64> {
        let max: Option<i64> = self.conn.query_row(
            &format!("SELECT MAX(id) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<CellValue>],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(table)
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        debug!(table, rows = rows.len(), "bulk insert committed");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::StorageType;

    fn columns() -> Vec<CommittedColumn> {
        vec![
            CommittedColumn {
                name: "name".to_string(),
                storage_type: StorageType::Varchar(100),
            },
            CommittedColumn {
                name: "age".to_string(),
                storage_type: StorageType::TinyInt,
            },
        ]
    }

    #[test]
    fn test_create_and_exists() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.table_exists("t").unwrap());
        store.create_table("t", &columns()).unwrap();
        assert!(store.table_exists("t").unwrap());
        // Idempotent.
        store.create_table("t", &columns()).unwrap();
    }

    #[test]
    fn test_max_surrogate_id_empty_table_is_zero() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &columns()).unwrap();
        assert_eq!(store.max_surrogate_id("t").unwrap(), 0);
    }

    #[test]
    fn test_bulk_insert_and_max_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &columns()).unwrap();

        let cols = vec!["id".to_string(), "name".to_string(), "age".to_string()];
        let rows = vec![
            vec![
                CellValue::Integer(1),
                CellValue::Text("alice".to_string()),
                CellValue::Integer(30),
            ],
            vec![
                CellValue::Integer(2),
                CellValue::Text("bob".to_string()),
                CellValue::Null,
            ],
        ];
        assert_eq!(store.insert_rows("t", &cols, &rows).unwrap(), 2);
        assert_eq!(store.max_surrogate_id("t").unwrap(), 2);
    }

    #[test]
    fn test_append_model_allows_duplicate_values() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table("t", &columns()).unwrap();
        let cols = vec!["id".to_string(), "name".to_string(), "age".to_string()];
        let row = vec![
            CellValue::Integer(1),
            CellValue::Text("same".to_string()),
            CellValue::Integer(1),
        ];
        let mut row2 = row.clone();
        row2[0] = CellValue::Integer(2);
        store.insert_rows("t", &cols, &[row, row2]).unwrap();
        assert_eq!(store.max_surrogate_id("t").unwrap(), 2);
    }
}
