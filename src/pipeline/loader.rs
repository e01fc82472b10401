//! Dataset loader for local CSV/Parquet files and remote CSV files

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use log::{debug, info};
use polars::prelude::*;

use crate::error::{DataError, Result};

/// Where a dataset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    /// Interpret a CLI argument as either a URL or a filesystem path
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            DataSource::Url(raw.to_string())
        } else {
            DataSource::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(p) => write!(f, "{}", p.display()),
            DataSource::Url(u) => write!(f, "{}", u),
        }
    }
}

/// Load a dataset from a file or URL into memory.
///
/// CSV inputs have date and datetime columns parsed. `infer_schema_length`
/// of 0 means a full scan for schema inference.
pub fn load_dataset(source: &DataSource, infer_schema_length: usize) -> Result<DataFrame> {
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let df = match source {
        DataSource::Path(path) => load_path(path, schema_length)?,
        DataSource::Url(url) => load_url(url, schema_length)?,
    };

    info!("Loaded {} ({} rows x {} columns)", source, df.height(), df.width());
    Ok(df)
}

fn load_path(path: &Path, schema_length: Option<usize>) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let df = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .with_try_parse_dates(true)
            .finish()?
            .collect()?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?.collect()?,
        _ => return Err(DataError::UnsupportedFormat(extension).into()),
    };

    Ok(df)
}

fn load_url(url: &str, schema_length: Option<usize>) -> Result<DataFrame> {
    debug!("Fetching {}", url);
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(schema_length)
        .map_parse_options(|opts| opts.with_try_parse_dates(true))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()?;

    Ok(df)
}

/// Load a dataset and report (rows, columns, estimated memory in MB)
pub fn load_dataset_with_stats(
    source: &DataSource,
    infer_schema_length: usize,
) -> Result<(DataFrame, usize, usize, f64)> {
    let df = load_dataset(source, infer_schema_length)?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    Ok((df, rows, cols, memory_mb))
}
