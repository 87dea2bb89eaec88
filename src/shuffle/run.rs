use crate::error::Result;
use crate::iterator::RecordIterator;
use crate::types::Record;

/// Records already in sort order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedRun {
    records: Vec<Record>,
}

impl SortedRun {
    /// Wrap records the caller has already sorted.
    pub fn new(records: Vec<Record>) -> Self {
        SortedRun { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Consume the run as a record cursor.
    pub fn into_cursor(self) -> RunIterator {
        RunIterator {
            records: self.records,
            pos: 0,
        }
    }
}

/// Cursor over an owned sorted run.
pub struct RunIterator {
    records: Vec<Record>,
    pos: usize,
}

impl RecordIterator for RunIterator {
    fn key(&self) -> &[u8] {
        &self.records[self.pos].key
    }

    fn value(&self) -> &[u8] {
        &self.records[self.pos].value
    }

    fn is_valid(&self) -> bool {
        self.pos < self.records.len()
    }

    fn next(&mut self) -> Result<()> {
        if self.is_valid() {
            self.pos += 1;
        }
        Ok(())
    }
}
