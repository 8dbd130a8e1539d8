/// Accumulates decoded records and produces the exported table.
use tracing::{debug, warn};

use crate::{record::LocationRecord, AGResult, Error};

/// One exported row. `index` is the position of the source message in the fetched list, the
/// same numbering [`SkippedMessage::message`] uses.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub index: usize,
    pub record: LocationRecord,
}

/// A message that was left out because its payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMessage {
    /// Position of the message in the fetched list.
    pub message: usize,
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<TableRow>,
    skipped: Vec<SkippedMessage>,
}

/// Complete records ordered by location date, unset dates last.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationTable {
    pub rows: Vec<TableRow>,
    /// Number of records collected, complete or not.
    pub collected: usize,
    pub skipped: Vec<SkippedMessage>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot of `record`, complete or not, decoded from fetched message `message`.
    pub fn push(&mut self, message: usize, record: LocationRecord) {
        self.records.push(TableRow {
            index: message,
            record,
        });
    }

    pub fn skip(&mut self, message: usize, len: usize) {
        warn!("skipping message {} with unsupported {} byte payload", message, len);
        self.skipped.push(SkippedMessage { message, len });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.skipped.is_empty()
    }

    /// Sort by date and drop records without a latitude.
    ///
    /// Returns [`Error::EmptyResult`] if nothing was ever pushed or skipped. A table with no
    /// rows is a valid result: it means messages arrived but none held a position.
    pub fn into_table(self) -> AGResult<LocationTable> {
        if self.is_empty() {
            return Err(Error::EmptyResult);
        }
        let collected = self.records.len();
        let mut rows = self.records;
        // Stable: equal dates keep arrival order.
        rows.sort_by_key(|r| (r.record.location_date.is_none(), r.record.location_date));
        rows.retain(|r| r.record.is_complete());
        debug!("{} of {} records complete", rows.len(), collected);
        Ok(LocationTable {
            rows,
            collected,
            skipped: self.skipped,
        })
    }
}
