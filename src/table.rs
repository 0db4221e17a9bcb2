//! # Table reader
//!
//! Reads a delimited file with a header row into named columns and infers a
//! storage type for every column. The metadata extractor only ever sees what
//! this module reports, so the inference policy below decides what ends up in
//! the embedded profile text.
//!
//! ## Type inference
//! | Non-missing values                 | Missing values | Type      |
//! |------------------------------------|----------------|-----------|
//! | all parse as `i64`                 | none           | `int64`   |
//! | all parse as `i64`                 | some           | `float64` |
//! | all parse as `f64`                 | any            | `float64` |
//! | all boolean literals               | none           | `bool`    |
//! | none at all (rows present)         | all            | `float64` |
//! | anything else, or no rows          |                | `object`  |
//!
//! Cells equal to one of [`NA_VALUES`] count as missing.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{CatalogError, Result};

/// Cell values treated as missing.
pub const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

/// Inferred storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl DType {
    /// Whether summary statistics are reported for this type.
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Int64 | DType::Float64 | DType::Bool)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named column; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Option<String>>,
}

impl Column {
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Non-missing values as `f64`. Empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        let present = self.values.iter().flatten().map(|v| v.trim());
        match self.dtype {
            DType::Int64 | DType::Float64 => present.filter_map(|v| v.parse().ok()).collect(),
            DType::Bool => present
                .map(|v| if TRUE_VALUES.contains(&v) { 1.0 } else { 0.0 })
                .collect(),
            DType::Object => Vec::new(),
        }
    }
}

/// A parsed table: its source name, row count and columns in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<Column>,
}

/// Read `path` as a comma-delimited table with a header row.
///
/// # Errors
/// [`CatalogError::Parse`] when the file is missing, empty, not UTF-8, or has
/// records whose width differs from the header.
pub fn read_table(path: &Path) -> Result<Table> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| CatalogError::parse(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| CatalogError::parse(path, e))?
        .clone();
    if headers.is_empty() {
        return Err(CatalogError::parse(path, "no columns to parse from file"));
    }

    let names = column_names(headers.iter());
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    let mut rows = 0;
    for record in reader.records() {
        let record = record.map_err(|e| CatalogError::parse(path, e))?;
        for (column, value) in cells.iter_mut().zip(record.iter()) {
            column.push(if NA_VALUES.contains(&value) {
                None
            } else {
                Some(value.to_string())
            });
        }
        rows += 1;
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column {
            name,
            dtype: infer_dtype(&values),
            values,
        })
        .collect();

    Ok(Table {
        name,
        rows,
        columns,
    })
}

/// Blank headers become `Unnamed: <i>`; repeated headers get `.1`, `.2`, ...
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .enumerate()
        .map(|(i, raw)| {
            let base = if raw.is_empty() {
                format!("Unnamed: {i}")
            } else {
                raw.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

pub fn infer_dtype(values: &[Option<String>]) -> DType {
    if values.is_empty() {
        return DType::Object;
    }
    let present: Vec<&str> = values.iter().flatten().map(|v| v.trim()).collect();
    if present.is_empty() {
        return DType::Float64;
    }
    let has_missing = present.len() < values.len();

    if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        return if has_missing {
            DType::Float64
        } else {
            DType::Int64
        };
    }
    if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        return DType::Float64;
    }
    if !has_missing
        && present
            .iter()
            .all(|v| TRUE_VALUES.contains(v) || FALSE_VALUES.contains(v))
    {
        return DType::Bool;
    }
    DType::Object
}
