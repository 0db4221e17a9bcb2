//! # Metadata extraction
//!
//! Turns one table into a [`DatasetProfile`], a typed summary whose
//! [`Display`](fmt::Display) output is the text that gets embedded:
//!
//! ```text
//! Dataset: sales.csv
//! Number of rows: 3
//! Number of columns: 2
//! Columns:
//!   - id: type=int64, nulls=0, mean=2.00, std=1.00, min=1.00, max=3.00
//!   - label: type=object, nulls=1
//! ```
//!
//! The wording and line order are part of the index: changing either means
//! every existing index has to be rebuilt.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::table::{DType, Table, read_table};

/// Summary statistics for a numeric column. Undefined values are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation (N - 1 denominator).
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() < 2 {
            f64::NAN
        } else {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (n - 1.0)).sqrt()
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std,
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: DType,
    pub nulls: usize,
    /// Present only for numeric columns.
    pub stats: Option<ColumnStats>,
}

/// Fixed-schema description of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn from_table(table: &Table) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|column| ColumnProfile {
                name: column.name.clone(),
                dtype: column.dtype,
                nulls: column.null_count(),
                stats: column
                    .dtype
                    .is_numeric()
                    .then(|| ColumnStats::from_values(&column.numeric_values())),
            })
            .collect();

        Self {
            name: table.name.clone(),
            rows: table.rows,
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

fn fmt_stat(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.2}")
    }
}

impl fmt::Display for ColumnProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: type={}, nulls={}",
            self.name, self.dtype, self.nulls
        )?;
        if let Some(stats) = &self.stats {
            write!(
                f,
                ", mean={}, std={}, min={}, max={}",
                fmt_stat(stats.mean),
                fmt_stat(stats.std),
                fmt_stat(stats.min),
                fmt_stat(stats.max)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for DatasetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.name)?;
        writeln!(f, "Number of rows: {}", self.rows)?;
        writeln!(f, "Number of columns: {}", self.column_count())?;
        write!(f, "Columns:")?;
        for column in &self.columns {
            write!(f, "\n{column}")?;
        }
        Ok(())
    }
}

/// Profile the table at `path`. Reads the file, never writes it.
///
/// # Errors
/// [`CatalogError::Parse`](crate::error::CatalogError::Parse) if the file is not a
/// delimited table with a header row.
pub fn extract_metadata(path: &Path) -> Result<DatasetProfile> {
    let table = read_table(path)?;
    let profile = DatasetProfile::from_table(&table);
    debug!(
        "Profiled {} ({} rows, {} columns)",
        profile.name,
        profile.rows,
        profile.column_count()
    );
    Ok(profile)
}

/// All `*.csv` files directly inside `dir`, sorted by file name.
pub fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// Expand a mix of files and directories into table paths. Directories
/// contribute their `*.csv` files; files are kept as given.
pub fn expand_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            sources.extend(csv_files_in(path)?);
        } else {
            sources.push(path.clone());
        }
    }
    Ok(sources)
}

/// Profile every CSV file in `dir`, in file-name order.
pub fn extract_directory(dir: &Path) -> Result<Vec<DatasetProfile>> {
    let files = csv_files_in(dir)?;
    info!("Extracting metadata for {} datasets in {}", files.len(), dir.display());
    files.iter().map(|path| extract_metadata(path)).collect()
}
