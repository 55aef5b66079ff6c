//! CSV table writer
//!
//! Rows go to a temp file next to the target; [`OutputWriter::close`] syncs
//! it and renames it over the target, so readers never see a partial table.

use csv::{Writer, WriterBuilder};
use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter, TableRow};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Atomic CSV writer for one table
pub struct CsvTableWriter<R: TableRow> {
    writer: Writer<BufWriter<NamedTempFile>>,
    target: PathBuf,
    rows_written: u64,
    _row: PhantomData<R>,
}

impl<R: TableRow> CsvTableWriter<R> {
    /// Start a table at `path` and write its header row
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let target = path.as_ref().to_path_buf();
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        std::fs::create_dir_all(&parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

        let temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, temp_file));

        writer
            .write_record(R::HEADERS)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;

        debug!(path = %target.display(), "CSV writer created");

        Ok(Self {
            writer,
            target,
            rows_written: 0,
            _row: PhantomData,
        })
    }

    /// Write one row
    pub fn write_row(&mut self, row: &R) -> OutputResult<()> {
        self.writer
            .serialize(row)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Write several rows
    pub fn write_rows(&mut self, rows: &[R]) -> OutputResult<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    /// Rows written so far (header excluded)
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Target path
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl<R: TableRow> OutputWriter for CsvTableWriter<R> {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;

        let temp_file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;

        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        temp_file
            .persist(&self.target)
            .map_err(|e| OutputError::PersistError(format!("{}: {e}", self.target.display())))?;

        info!(
            path = %self.target.display(),
            rows = self.rows_written,
            "Table written"
        );
        Ok(())
    }
}

/// Write a whole table atomically and return the number of rows
pub fn write_table<R: TableRow, P: AsRef<Path>>(path: P, rows: &[R]) -> OutputResult<u64> {
    let mut writer = CsvTableWriter::<R>::new(path)?;
    writer.write_rows(rows)?;
    let rows_written = writer.rows_written();
    writer.close()?;
    Ok(rows_written)
}
