//! Tabular output writers

use serde::Serialize;

pub mod csv;
pub mod path;

pub use self::csv::{write_table, CsvTableWriter};
pub use path::{OutputKind, OutputLayout};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Finished file could not be moved into place
    #[error("persist error: {0}")]
    PersistError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer
pub trait OutputWriter {
    /// Flush any buffered data
    fn flush(&mut self) -> OutputResult<()>;

    /// Finalize the output and make it visible at its target path
    fn close(self) -> OutputResult<()>;
}

/// A row of an output table
///
/// `HEADERS` is written even when the table has no rows, and must list the
/// serialized fields in declaration order.
pub trait TableRow: Serialize {
    /// Column names
    const HEADERS: &'static [&'static str];
}
