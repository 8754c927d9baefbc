//! Telemetry buffer
//!
//! Append-only store of parsed records. A record's position never changes
//! once appended; the only way to shrink the buffer is [`TelemetryBuffer::clear`]
//! on an explicit reset.

use std::ops::Range;

use crate::types::TelemetryRecord;

#[derive(Debug, Clone, Default)]
pub struct TelemetryBuffer {
    records: Vec<TelemetryRecord>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Append a record and return its position
    pub fn append(&mut self, record: TelemetryRecord) -> usize {
        debug_assert!(
            self.records
                .last()
                .map_or(true, |last| last.sequence() < record.sequence()),
            "sequence numbers must strictly increase"
        );
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TelemetryRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    /// Records `[0, cursor)`, borrowed; clamped to the buffer length
    pub fn prefix(&self, cursor: usize) -> &[TelemetryRecord] {
        &self.records[..cursor.min(self.records.len())]
    }

    /// Records in `range`, clamped to the buffer length
    pub fn slice(&self, range: Range<usize>) -> &[TelemetryRecord] {
        let end = range.end.min(self.records.len());
        let start = range.start.min(end);
        &self.records[start..end]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TelemetryRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a> IntoIterator for &'a TelemetryBuffer {
    type Item = &'a TelemetryRecord;
    type IntoIter = std::slice::Iter<'a, TelemetryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
