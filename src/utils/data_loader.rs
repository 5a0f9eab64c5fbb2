//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Rows scanned when inferring CSV column types
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Supported tabular formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
    /// One JSON object per line
    JsonLines,
}

impl FileFormat {
    /// Detect format from extension; unknown extensions are read as CSV
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "tsv" => FileFormat::Tsv,
            "parquet" | "pq" => FileFormat::Parquet,
            "json" => FileFormat::Json,
            "jsonl" | "ndjson" => FileFormat::JsonLines,
            _ => FileFormat::Csv,
        }
    }
}

/// Data loader for the supported file formats
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    /// Cap on rows read, mostly for quick inspection
    n_rows: Option<usize>,
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Read at most `n` rows
    pub fn with_n_rows(mut self, n: usize) -> Self {
        self.n_rows = Some(n);
        self
    }

    /// Load a delimited text file with a header row
    pub fn load_delimited(&self, path: &Path, delimiter: u8) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_n_rows(self.n_rows)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        Ok(self.truncate(df))
    }

    /// Load a JSON file holding an array of records
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        self.load_json_format(path, JsonFormat::Json)
    }

    /// Load a line-delimited JSON file, one record per line
    pub fn load_json_lines(&self, path: &Path) -> Result<DataFrame> {
        self.load_json_format(path, JsonFormat::JsonLines)
    }

    fn load_json_format(&self, path: &Path, format: JsonFormat) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = JsonReader::new(file)
            .with_json_format(format)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        Ok(self.truncate(df))
    }

    fn truncate(&self, df: DataFrame) -> DataFrame {
        match self.n_rows {
            Some(n) => df.head(Some(n)),
            None => df,
        }
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        match FileFormat::from_path(path) {
            FileFormat::Csv => self.load_delimited(path, b','),
            FileFormat::Tsv => self.load_delimited(path, b'\t'),
            FileFormat::Parquet => self.load_parquet(path),
            FileFormat::Json => self.load_json(path),
            FileFormat::JsonLines => self.load_json_lines(path),
        }
    }
}
