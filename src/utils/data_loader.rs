//! Data loading utilities

use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// CSV loader for the match dataset
pub struct DataLoader {
    /// Rows used for schema inference; `None` scans the whole file
    infer_schema_length: Option<usize>,
    /// Field separator
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: None,
            separator: b',',
        }
    }

    /// Infer column types from the first `n` rows instead of the whole file
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n.max(1));
        self
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let start = Instant::now();
        let file = File::open(path.as_ref())?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| AnalysisError::DataError(e.to_string()))?;

        debug!(
            path = %path.as_ref().display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );

        Ok(df)
    }

    /// Get file info without parsing column types
    pub fn get_file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let header = lines.next().transpose()?.unwrap_or_default();
        let separator = self.separator as char;
        let columns: Vec<String> = if header.is_empty() {
            Vec::new()
        } else {
            header.split(separator).map(|s| s.trim().to_string()).collect()
        };

        let mut n_rows = 0usize;
        for line in lines {
            if !line?.trim().is_empty() {
                n_rows += 1;
            }
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            n_rows,
            n_cols: columns.len(),
            columns,
        })
    }
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
}
