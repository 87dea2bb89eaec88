use std::cmp::Ordering;

use crate::comparator::RawComparator;
use crate::error::Result;
use crate::shuffle::run::SortedRun;
use crate::types::{RawKey, RawValue, Record};

/// Map output for one partition, held in arrival order until sorted.
#[derive(Debug, Default)]
pub struct SortBuffer {
    records: Vec<Record>,
    size_bytes: usize,
}

impl SortBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: RawKey, value: RawValue) {
        self.size_bytes += key.len() + value.len();
        self.records.push(Record::new(key, value));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key and value bytes buffered so far.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Sort the buffered records into a run.
    ///
    /// Every key is validated against `comparator` first, so a corrupt key
    /// fails the sort up front instead of leaving it with an inconsistent
    /// order. The sort is stable: records with equal keys keep arrival order.
    pub fn sort(self, comparator: &dyn RawComparator) -> Result<SortedRun> {
        for record in &self.records {
            comparator.validate(&record.key)?;
        }

        let mut records = self.records;
        let mut failure = None;
        records.sort_by(|a, b| match comparator.compare(&a.key, &b.key) {
            Ok(ord) => ord,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(SortedRun::new(records)),
        }
    }
}
