use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparator::RawComparator;
use crate::error::Result;
use crate::iterator::RecordIterator;

/// Merges several sorted record streams into one sorted stream.
///
/// The reduce side of the shuffle uses this to combine the sorted runs cut
/// for a partition. Every source must already be sorted under `comparator`.
///
/// Ties go to the source with the lower index, and each source keeps its
/// own order, so the merge is stable.
///
/// The smallest head is found by a linear scan over the sources.
pub struct MergeIterator {
    iters: Vec<Box<dyn RecordIterator>>,
    comparator: Arc<dyn RawComparator>,
    current: Option<usize>,
}

impl MergeIterator {
    /// Create a new MergeIterator and position it at the smallest record.
    pub fn new(
        iters: Vec<Box<dyn RecordIterator>>,
        comparator: Arc<dyn RawComparator>,
    ) -> Result<Self> {
        let mut merged = MergeIterator {
            iters,
            comparator,
            current: None,
        };
        merged.find_smallest()?;
        Ok(merged)
    }

    /// Number of underlying sources, exhausted ones included.
    pub fn num_sources(&self) -> usize {
        self.iters.len()
    }

    fn find_smallest(&mut self) -> Result<()> {
        let mut smallest: Option<usize> = None;
        for (i, iter) in self.iters.iter().enumerate() {
            if !iter.is_valid() {
                continue;
            }
            smallest = match smallest {
                None => Some(i),
                Some(best) => {
                    let ord = self.comparator.compare(iter.key(), self.iters[best].key())?;
                    if ord == Ordering::Less { Some(i) } else { Some(best) }
                }
            };
        }
        self.current = smallest;
        Ok(())
    }
}

impl RecordIterator for MergeIterator {
    fn key(&self) -> &[u8] {
        match self.current {
            Some(i) => self.iters[i].key(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.current {
            Some(i) => self.iters[i].value(),
            None => &[],
        }
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        if let Some(i) = self.current {
            self.iters[i].next()?;
            self.find_smallest()?;
        }
        Ok(())
    }
}
