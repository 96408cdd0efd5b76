//! CSV Data Loader Module
//! Reads the epidemiological CSV into a Polars DataFrame.

use log::{debug, info};
use polars::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("The file '{}' was not found.", .0.display())]
    NotFound(PathBuf),
    #[error("The file '{}' is empty.", .0.display())]
    Empty(PathBuf),
    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// Handles CSV file loading with Polars.
pub struct DataLoader {
    df: Option<DataFrame>,
    file_path: Option<PathBuf>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            df: None,
            file_path: None,
        }
    }

    /// Load a CSV file, failing fast on a missing, empty or unreadable file.
    pub fn load_csv(&mut self, file_path: &Path) -> Result<&DataFrame, LoaderError> {
        self.file_path = Some(file_path.to_path_buf());
        self.df = None;

        let metadata = fs::metadata(file_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoaderError::NotFound(file_path.to_path_buf()),
            _ => LoaderError::Read {
                path: file_path.to_path_buf(),
                source: e.into(),
            },
        })?;
        if metadata.is_file() && metadata.len() == 0 {
            return Err(LoaderError::Empty(file_path.to_path_buf()));
        }

        debug!("Reading {} ({} bytes)", file_path.display(), metadata.len());

        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()
            .and_then(|lazy| lazy.collect())
            .map_err(|e| match e {
                PolarsError::NoData(_) => LoaderError::Empty(file_path.to_path_buf()),
                other => LoaderError::Read {
                    path: file_path.to_path_buf(),
                    source: other,
                },
            })?;

        if df.height() == 0 {
            return Err(LoaderError::Empty(file_path.to_path_buf()));
        }

        info!(
            "Loaded {} rows, {} columns from {}",
            df.height(),
            df.width(),
            file_path.display()
        );

        Ok(&*self.df.insert(df))
    }

    /// Get list of column names from loaded DataFrame.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Get file path.
    pub fn get_file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Hand the loaded DataFrame over to the next stage.
    pub fn take_dataframe(&mut self) -> Option<DataFrame> {
        self.df.take()
    }
}

/// Get list of numeric column names.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| {
            matches!(
                col.dtype(),
                DataType::Float32
                    | DataType::Float64
                    | DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
            )
        })
        .map(|col| col.name().to_string())
        .collect()
}
