use std::fs::File;
use std::path::Path;

use crate::error::{CollectorError, Result};
use crate::flatten::FindingRecord;

/// Owns the single output file handle for the whole run. Transitions one way
/// through created -> header written -> closed; there is no reopen.
///
/// Fields are tab-delimited: free-text columns routinely carry unescaped
/// commas, and downstream ingestion mis-counts fields on comma-delimited
/// rows. Changing the delimiter changes on-disk format compatibility.
pub struct OutputWriter {
    inner: Option<csv::Writer<File>>,
    header_written: bool,
}

impl OutputWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|e| {
                CollectorError::Write(format!(
                    "could not create output file {}: {e}",
                    path.display()
                ))
            })?;

        Ok(Self {
            inner: Some(writer),
            header_written: false,
        })
    }

    /// Writes the header row. Calling this twice is an error.
    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Err(CollectorError::Write(
                "header has already been written".to_string(),
            ));
        }
        let writer = self.inner.as_mut().ok_or_else(closed_error)?;
        writer
            .write_record(FindingRecord::headers())
            .map_err(|e| CollectorError::Write(format!("could not write header: {e}")))?;
        self.header_written = true;
        Ok(())
    }

    /// Appends one sanitized row. The header must have been written first.
    pub fn write_record(&mut self, record: &FindingRecord) -> Result<()> {
        if !self.header_written {
            return Err(CollectorError::Write(
                "cannot write a row before the header".to_string(),
            ));
        }
        let writer = self.inner.as_mut().ok_or_else(closed_error)?;
        writer
            .write_record(record.to_row())
            .map_err(|e| CollectorError::Write(format!("could not write row: {e}")))
    }

    /// Pushes buffered rows to disk. A durability checkpoint, not a close.
    pub fn flush(&mut self) -> Result<()> {
        let writer = self.inner.as_mut().ok_or_else(closed_error)?;
        writer
            .flush()
            .map_err(|e| CollectorError::Write(format!("could not flush output file: {e}")))
    }

    /// Final flush and close. The only path that guarantees bytes reach
    /// durable storage; closing twice is an error.
    pub fn flush_and_close(&mut self) -> Result<()> {
        let mut writer = self.inner.take().ok_or_else(closed_error)?;
        writer
            .flush()
            .map_err(|e| CollectorError::Write(format!("could not flush output file: {e}")))
    }
}

fn closed_error() -> CollectorError {
    CollectorError::Write("output writer is closed".to_string())
}
