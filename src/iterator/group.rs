use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparator::RawComparator;
use crate::error::Result;
use crate::iterator::RecordIterator;
use crate::types::Record;

/// Splits a sorted record stream into reduce groups.
///
/// A group is a maximal run of consecutive records whose keys compare equal
/// to the group's first key under `comparator`. With a full-order
/// comparator that is one group per distinct key; with
/// `PrimaryFieldComparator` it is one group per distinct first field, the
/// records inside still in full sort order.
///
/// Records are copied out of the source as they are read. After an error
/// the iterator yields nothing further.
pub struct GroupIterator<I> {
    source: I,
    comparator: Arc<dyn RawComparator>,
    failed: bool,
}

impl<I: RecordIterator> GroupIterator<I> {
    pub fn new(source: I, comparator: Arc<dyn RawComparator>) -> Self {
        GroupIterator {
            source,
            comparator,
            failed: false,
        }
    }

    fn next_group(&mut self) -> Result<Vec<Record>> {
        let mut group = vec![Record::new(
            self.source.key().to_vec(),
            self.source.value().to_vec(),
        )];
        self.source.next()?;

        while self.source.is_valid()
            && self.comparator.compare(&group[0].key, self.source.key())? == Ordering::Equal
        {
            group.push(Record::new(
                self.source.key().to_vec(),
                self.source.value().to_vec(),
            ));
            self.source.next()?;
        }
        Ok(group)
    }
}

impl<I: RecordIterator> Iterator for GroupIterator<I> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.source.is_valid() {
            return None;
        }
        let group = self.next_group();
        if group.is_err() {
            self.failed = true;
        }
        Some(group)
    }
}
