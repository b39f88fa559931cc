//! Record file adapter: reads delimited text or Parquet into raw records
//!
//! Every column is read as text so that decimal commas and localized
//! timestamps reach the normalizer untouched.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::record::{EpochMillis, RawRecord, Series};
use crate::constants::ingest::{
    AUX_ATTRIBUTE_COLUMN, COMPACT_TIMESTAMP_LENGTH, QUALITY_COLUMN, SERIES_KEY_COLUMN,
    TICKS_COLUMN, TIMESTAMP_COLUMN, VALUE_COLUMN,
};
use crate::data::normalize::parse_timestamp;
use crate::error::{Result, TrendError};

/// Raw records read from one file
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub file_size: u64,
    pub records: Vec<RawRecord>,
}

impl LoadedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Summary shown next to the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    pub file_size: u64,
    pub variables_count: usize,
    pub first_timestamp: Option<EpochMillis>,
    pub last_timestamp: Option<EpochMillis>,
    /// Export time stamped into the file name, if any
    pub exported_at: Option<EpochMillis>,
}

impl FileInfo {
    pub fn describe(file: &LoadedFile, series: &[Series]) -> Self {
        let extent = super::record::Domain::extent_of(series);
        let file_name = file.file_name();
        Self {
            exported_at: timestamp_from_file_name(&file_name),
            file_name,
            file_size: file.file_size,
            variables_count: series.len(),
            first_timestamp: extent.map(|d| d.start),
            last_timestamp: extent.map(|d| d.end),
        }
    }
}

/// Load raw records from a `.csv`/`.txt` (`;` or `,` separated) or `.parquet` file
pub fn load_records(path: &Path) -> Result<LoadedFile> {
    profiling::scope!("load_records");

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TrendError::UnsupportedFormat {
            extension: String::new(),
        })?;

    let df = match extension.to_lowercase().as_str() {
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?.collect()?,
        "csv" | "txt" => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(sniff_separator(path)?)
            // Zero inference rows reads every column as text
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?,
        ext => {
            return Err(TrendError::UnsupportedFormat {
                extension: ext.to_string(),
            });
        }
    };

    let records = records_from_frame(&df)?;
    let file_size = std::fs::metadata(path)?.len();

    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        records = records.len(),
        "loaded record file"
    );

    Ok(LoadedFile {
        path: path.to_path_buf(),
        file_size,
        records,
    })
}

/// `;` when the header line holds more semicolons than commas, `,` otherwise
fn sniff_separator(path: &Path) -> Result<u8> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

fn text_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(Some(values))
}

fn required_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    text_column(df, name)?.ok_or_else(|| TrendError::ColumnNotFound {
        column: name.to_string(),
    })
}

fn records_from_frame(df: &DataFrame) -> Result<Vec<RawRecord>> {
    let names = required_column(df, SERIES_KEY_COLUMN)?;
    let values = required_column(df, VALUE_COLUMN)?;
    let stamps = text_column(df, TIMESTAMP_COLUMN)?;
    let ticks = text_column(df, TICKS_COLUMN)?;
    if stamps.is_none() && ticks.is_none() {
        return Err(TrendError::ColumnNotFound {
            column: TIMESTAMP_COLUMN.to_string(),
        });
    }
    let attrs = text_column(df, AUX_ATTRIBUTE_COLUMN)?;
    let quality = text_column(df, QUALITY_COLUMN)?;

    let cell = |col: &Option<Vec<Option<String>>>, row: usize| -> Option<String> {
        col.as_ref()
            .and_then(|c| c.get(row).cloned().flatten())
            .filter(|s| !s.trim().is_empty())
    };

    let mut records = Vec::with_capacity(df.height());
    let mut unnamed = 0usize;
    for row in 0..df.height() {
        let Some(series_key) = names[row].clone().filter(|s| !s.trim().is_empty()) else {
            unnamed += 1;
            continue;
        };

        records.push(RawRecord {
            series_key,
            aux_attribute: cell(&attrs, row).unwrap_or_default(),
            raw_timestamp: cell(&stamps, row)
                .or_else(|| cell(&ticks, row))
                .unwrap_or_default(),
            raw_value: values[row].clone().unwrap_or_default(),
            quality: cell(&quality, row).and_then(|q| q.trim().parse().ok()),
        });
    }

    if unnamed > 0 {
        tracing::debug!(rows = unnamed, "skipped rows without a series name");
    }
    Ok(records)
}

/// Extract an embedded `yyyyMMddHHmmss` stamp from a file name
pub fn timestamp_from_file_name(name: &str) -> Option<EpochMillis> {
    let bytes = name.as_bytes();
    bytes
        .windows(COMPACT_TIMESTAMP_LENGTH)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|start| parse_timestamp(&name[start..start + COMPACT_TIMESTAMP_LENGTH]))
}
