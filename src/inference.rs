//! Type Inference Engine.
//!
//! Pure function from a column's sampled values to one storage type, using
//! majority-vote numeric detection: a column is numeric only when strictly
//! more than half of its non-null values parse as numbers. Deterministic and
//! side-effect free.

use crate::value::{is_null_token, parse_boolean};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref DATETIME_PATTERN: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}(:\d{2})?$").unwrap();
}

/// Warehouse storage types the pipeline can commit a column to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Double,
    Boolean,
    Date,
    DateTime,
    Varchar(u32),
}

impl StorageType {
    /// DDL rendering of the type.
    pub fn ddl(&self) -> String {
        match self {
            StorageType::TinyInt => "TINYINT".to_string(),
            StorageType::SmallInt => "SMALLINT".to_string(),
            StorageType::Int => "INT".to_string(),
            StorageType::BigInt => "BIGINT".to_string(),
            StorageType::Double => "DOUBLE".to_string(),
            StorageType::Boolean => "BOOLEAN".to_string(),
            StorageType::Date => "DATE".to_string(),
            StorageType::DateTime => "DATETIME".to_string(),
            StorageType::Varchar(n) => format!("VARCHAR({n})"),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            StorageType::TinyInt | StorageType::SmallInt | StorageType::Int | StorageType::BigInt
        )
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ddl())
    }
}

/// Smallest text tier, used for entirely-null columns.
const SMALLEST_TEXT_TIER: StorageType = StorageType::Varchar(100);

/// Infer the storage type for one column from its sampled raw values.
pub fn infer_storage_type<S: AsRef<str>>(values: &[S]) -> StorageType {
    let sample: Vec<&str> = values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !is_null_token(v))
        .collect();

    if sample.is_empty() {
        return SMALLEST_TEXT_TIER;
    }

    if sample.iter().all(|v| parse_boolean(v).is_some()) {
        return StorageType::Boolean;
    }

    // Majority vote: strictly more than half must parse as numbers; a tie is
    // not numeric. Non-parseable values are dropped before range analysis.
    let numeric: Vec<f64> = sample
        .iter()
        .filter_map(|v| v.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .collect();
    if numeric.len() * 2 > sample.len() {
        return numeric_storage_type(&numeric);
    }

    if sample.iter().all(|v| DATE_PATTERN.is_match(v)) {
        return StorageType::Date;
    }

    if sample.iter().all(|v| DATETIME_PATTERN.is_match(v)) {
        return StorageType::DateTime;
    }

    let max_len = sample.iter().map(|v| v.chars().count()).max().unwrap_or(0);
    varchar_tier(max_len)
}

/// Range-based selection for a numeric column. Columns whose values are all
/// exact whole numbers collapse to the matching integer tier; values beyond
/// the signed 64-bit range fall back to DOUBLE rather than failing.
fn numeric_storage_type(values: &[f64]) -> StorageType {
    debug_assert!(!values.is_empty());

    if values.iter().any(|v| v.fract() != 0.0) {
        return StorageType::Double;
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min < i64::MIN as f64 || max > i64::MAX as f64 {
        return StorageType::Double;
    }

    integer_tier(min as i64, max as i64)
}

/// Smallest signed integer tier bounding both observed extremes.
fn integer_tier(min: i64, max: i64) -> StorageType {
    if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        StorageType::TinyInt
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        StorageType::SmallInt
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        StorageType::Int
    } else {
        StorageType::BigInt
    }
}

/// Capacity tier by maximum observed string length, with fixed breakpoints.
fn varchar_tier(max_len: usize) -> StorageType {
    if max_len <= 50 {
        StorageType::Varchar(100)
    } else if max_len <= 100 {
        StorageType::Varchar(200)
    } else if max_len <= 255 {
        StorageType::Varchar(500)
    } else if max_len <= 1000 {
        StorageType::Varchar(2000)
    } else {
        StorageType::Varchar(65533)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: &[&str]) -> StorageType {
        infer_storage_type(values)
    }

    #[test]
    fn test_majority_vote_threshold() {
        // Exactly half numeric: not numeric.
        let tie = ["1", "2", "3", "4", "5", "a", "b", "c", "d", "e"];
        assert_eq!(infer(&tie), StorageType::Varchar(100));

        // Six of ten numeric: numeric, non-parseable values discarded.
        let majority = ["1", "2", "3", "4", "5", "6", "a", "b", "c", "d"];
        assert_eq!(infer(&majority), StorageType::TinyInt);
    }

    #[test]
    fn test_integer_tiers() {
        assert_eq!(infer(&["-5", "100"]), StorageType::TinyInt);
        assert_eq!(infer(&["-5", "1000"]), StorageType::SmallInt);
        assert_eq!(infer(&["-5", "100000"]), StorageType::Int);
        assert_eq!(infer(&["0", "5000000000"]), StorageType::BigInt);
    }

    #[test]
    fn test_out_of_range_falls_back_to_double() {
        assert_eq!(infer(&["100000000000000000000"]), StorageType::Double);
        assert_eq!(infer(&["1e20"]), StorageType::Double);
    }

    #[test]
    fn test_whole_floats_collapse_to_integer_tier() {
        assert_eq!(infer(&["22.0", "23.0"]), StorageType::TinyInt);
        assert_eq!(infer(&["22.0", "40000.0"]), StorageType::Int);
    }

    #[test]
    fn test_fractional_values_stay_double() {
        assert_eq!(infer(&["1.5", "2.25"]), StorageType::Double);
    }

    #[test]
    fn test_boolean_detection() {
        assert_eq!(infer(&["true", "False", "TRUE"]), StorageType::Boolean);
        // Mixed with other text falls through.
        assert_eq!(infer(&["true", "maybe"]), StorageType::Varchar(100));
    }

    #[test]
    fn test_date_and_datetime_patterns() {
        assert_eq!(infer(&["2024-01-05", "2023-12-31"]), StorageType::Date);
        assert_eq!(
            infer(&["2024-01-05 10:30:00", "2024-01-06T08:00:00"]),
            StorageType::DateTime
        );
        // A short date does not match the 8-digit dash pattern.
        assert_eq!(infer(&["2024-1-5"]), StorageType::Varchar(100));
    }

    #[test]
    fn test_varchar_tiers() {
        assert_eq!(infer(&["short"]), StorageType::Varchar(100));
        assert_eq!(infer(&[&"x".repeat(60)]), StorageType::Varchar(200));
        assert_eq!(infer(&[&"x".repeat(200)]), StorageType::Varchar(500));
        assert_eq!(infer(&[&"x".repeat(600)]), StorageType::Varchar(2000));
        assert_eq!(infer(&[&"x".repeat(2000)]), StorageType::Varchar(65533));
    }

    #[test]
    fn test_empty_column_defaults_to_smallest_text_tier() {
        assert_eq!(infer(&["", "NULL", "  "]), StorageType::Varchar(100));
        let none: [&str; 0] = [];
        assert_eq!(infer(&none), StorageType::Varchar(100));
    }

    #[test]
    fn test_nulls_excluded_from_vote() {
        // Nulls do not count toward the denominator.
        assert_eq!(infer(&["1", "2", "NULL", "", "3"]), StorageType::TinyInt);
    }

    #[test]
    fn test_deterministic() {
        let sample = ["1", "2", "x", "4", "5"];
        let first = infer(&sample);
        for _ in 0..10 {
            assert_eq!(infer(&sample), first);
        }
    }
}
