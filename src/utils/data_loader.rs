//! Data loading utilities

use crate::error::{Result, SwiftPredictError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Data loader for CSV/TSV, Parquet and JSON files
pub struct DataLoader {
    /// Number of threads for CSV parsing
    n_threads: Option<usize>,
    /// Rows read to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            n_threads: None,
            infer_schema_length: 100,
        }
    }

    pub fn with_n_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    fn open(path: &Path) -> Result<File> {
        File::open(path).map_err(|e| {
            SwiftPredictError::Data(format!("cannot open '{}': {}", path.display(), e))
        })
    }

    /// Load a delimited file with a header row. Date-like text columns are
    /// parsed as dates.
    pub fn load_csv(&self, path: impl AsRef<Path>, separator: u8) -> Result<DataFrame> {
        let file = Self::open(path.as_ref())?;

        let parse_opts = CsvParseOptions::default()
            .with_separator(separator)
            .with_try_parse_dates(true);

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_n_threads(self.n_threads)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        Ok(reader.finish()?)
    }

    pub fn load_parquet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = Self::open(path.as_ref())?;
        Ok(ParquetReader::new(file).finish()?)
    }

    /// Load a JSON array of records, or newline-delimited records
    pub fn load_json(&self, path: impl AsRef<Path>, lines: bool) -> Result<DataFrame> {
        let file = Self::open(path.as_ref())?;
        let format = if lines { JsonFormat::JsonLines } else { JsonFormat::Json };
        Ok(JsonReader::new(file).with_json_format(format).finish()?)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let df = match extension.as_str() {
            "tsv" => self.load_csv(path, b'\t')?,
            "parquet" | "pq" => self.load_parquet(path)?,
            "json" => self.load_json(path, false)?,
            "jsonl" | "ndjson" => self.load_json(path, true)?,
            // CSV is the fallback for unknown extensions
            _ => self.load_csv(path, b',')?,
        };

        info!(path = %path.display(), rows = df.height(), columns = df.width(), "Loaded dataset");
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_load_csv_parses_dates() {
        let file = write_temp(".csv", &["a,when,label", "1,2024-01-02,x", "4,2024-02-03,y"]);
        let df = DataLoader::new().load_auto(file.path()).unwrap();

        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("when").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("label").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_tsv() {
        let file = write_temp(".tsv", &["a\tb", "1\t2", "3\t4", "5\t6"]);
        let df = DataLoader::new().load_auto(file.path()).unwrap();
        assert_eq!(df.shape(), (3, 2));
    }

    #[test]
    fn test_load_json_lines() {
        let file = write_temp(".jsonl", &[r#"{"a": 1, "b": "x"}"#, r#"{"a": 2, "b": "y"}"#]);
        let df = DataLoader::new().load_auto(file.path()).unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_missing_file() {
        assert!(DataLoader::new().load_auto("/nonexistent/data.csv").is_err());
    }
}
