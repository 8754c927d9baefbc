//! CSV replay source
//!
//! Opens a CSV file with a header row of channel names. The data rows are
//! counted once at open so the total is known before playback starts; a
//! file with no header or no data rows fails to open. Rows appended to the
//! file after open are not played.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, Reader, ReaderBuilder};

use super::{ReadOutcome, SourceInfo, TelemetrySource};
use crate::config::ReplayConfig;
use crate::error::{Result, TelemetryError};
use crate::types::{RawLine, TotalKnown};

/// Finite, restartable CSV source
pub struct CsvReplaySource {
    path: PathBuf,
    rows_per_tick: usize,
    reader: Option<Reader<File>>,
    record: ByteRecord,
    rows_read: u64,
    /// Data rows counted at open
    total: u64,
}

impl CsvReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows_per_tick: 1,
            reader: None,
            record: ByteRecord::new(),
            rows_read: 0,
            total: 0,
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(&config.path).with_rows_per_tick(config.rows_per_tick)
    }

    pub fn with_rows_per_tick(mut self, rows: usize) -> Self {
        self.rows_per_tick = rows.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_reader(&self) -> Result<Reader<File>> {
        let file = File::open(&self.path).map_err(|e| self.open_error(e))?;
        Ok(ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file))
    }

    fn open_error(&self, reason: impl ToString) -> TelemetryError {
        TelemetryError::source_open(self.path.display().to_string(), reason)
    }

    /// Count data rows with a throwaway reader
    fn count_rows(&self) -> Result<usize> {
        let mut reader = self.open_reader()?;
        let mut record = ByteRecord::new();
        let mut total = 0;
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| self.open_error(e))?
        {
            total += 1;
        }
        Ok(total)
    }
}

impl TelemetrySource for CsvReplaySource {
    fn open(&mut self) -> Result<SourceInfo> {
        self.close();

        let mut reader = self.open_reader()?;
        let header = reader
            .byte_headers()
            .map_err(|e| self.open_error(e))?
            .clone();
        if header.is_empty() {
            return Err(self.open_error("file is empty"));
        }

        let columns = header
            .iter()
            .map(|field| {
                std::str::from_utf8(field)
                    .map(|s| s.trim().to_string())
                    .map_err(|_| self.open_error("header is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>>>()?;

        let total = self.count_rows()?;
        if total == 0 {
            return Err(self.open_error("file has no data rows"));
        }

        tracing::info!(
            "Opened replay file {} ({} columns, {} rows)",
            self.path.display(),
            columns.len(),
            total
        );

        self.reader = Some(reader);
        self.rows_read = 0;
        self.total = total as u64;

        Ok(SourceInfo {
            total_known: TotalKnown::Bounded(total),
            columns: Some(columns),
        })
    }

    fn read_next(&mut self) -> Result<ReadOutcome> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(TelemetryError::SourceUnavailable(format!(
                "{} is not open",
                self.path.display()
            )));
        };
        if self.rows_read >= self.total {
            return Ok(ReadOutcome::EndOfStream);
        }

        match reader.read_byte_record(&mut self.record) {
            Ok(true) => {
                self.rows_read += 1;
                // Header is line 1, so a row's line number doubles as its offset
                let offset = self
                    .record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.rows_read + 1);
                let fields = self.record.iter().map(|f| f.to_vec()).collect();
                Ok(ReadOutcome::Line(RawLine::row(offset, fields)))
            }
            Ok(false) => Ok(ReadOutcome::EndOfStream),
            Err(e) => {
                self.reader = None;
                Err(TelemetryError::SourceUnavailable(format!(
                    "failed reading {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }

    fn close(&mut self) {
        self.reader = None;
        self.rows_read = 0;
        self.total = 0;
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn is_restartable(&self) -> bool {
        true
    }

    fn units_per_tick(&self) -> usize {
        self.rows_per_tick
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }
}
