//! Tabular writers for normalized signals.
//!
//! This module writes a signal as headerless delimited text:
//! - CSV with one `position,attenuation` pair per line
//! - TSV with one `position<TAB>attenuation` pair per line

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::WriterBuilder;
use log::debug;
use thiserror::Error;

use super::trace::{SignalSeries, Trace};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Output extension has no writer.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Mismatched series lengths.
    #[error("series length mismatch: {positions_len} positions, {attenuations_len} attenuations")]
    LengthMismatch {
        positions_len: usize,
        attenuations_len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Output formats for signal export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
}

impl ExportFormat {
    /// Detects the format from the output extension (case-insensitive).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(WriteError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            ExportFormat::Csv => b',',
            ExportFormat::Tsv => b'\t',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = WriteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(WriteError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Formats a value with fixed precision, or the shortest representation that
/// parses back to the same `f64`.
fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(p) => format!("{:.*}", p, value),
        None => value.to_string(),
    }
}

/// Write a signal series as delimited text.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `series` - Positions and attenuations of equal length
/// * `format` - CSV or TSV
/// * `precision` - Fixed decimal places, or `None` for lossless output
///
/// # Errors
///
/// Returns an error if:
/// - The series axes differ in length
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use otdr_trace::core::trace::{RawSample, Trace};
/// use otdr_trace::core::writers::{write_signal, ExportFormat};
/// use std::path::Path;
///
/// let trace = Trace::new(vec![RawSample::new(0.0, 1.0)]);
/// write_signal(Path::new("trace.csv"), &trace.series(), ExportFormat::Csv, None).unwrap();
/// ```
pub fn write_signal(
    path: &Path,
    series: &SignalSeries,
    format: ExportFormat,
    precision: Option<usize>,
) -> Result<()> {
    if series.positions.len() != series.attenuations.len() {
        return Err(WriteError::LengthMismatch {
            positions_len: series.positions.len(),
            attenuations_len: series.attenuations.len(),
        });
    }

    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(format.delimiter())
        .from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    for (position, attenuation) in series.points() {
        csv_writer
            .write_record(&[
                format_value(position, precision),
                format_value(attenuation, precision),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    debug!("wrote {} points to {}", series.len(), path.display());
    Ok(())
}

/// Write the trace's current signal, choosing CSV or TSV from the extension.
pub fn dump(path: &Path, trace: &Trace, precision: Option<usize>) -> Result<()> {
    let format = ExportFormat::from_path(path)?;
    write_signal(path, &trace.series(), format, precision)
}
