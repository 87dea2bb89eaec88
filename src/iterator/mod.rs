pub mod group;
pub mod merge;

use crate::error::Result;

pub use group::GroupIterator;
pub use merge::MergeIterator;

/// Cursor over serialized records in key order.
///
/// Sorted runs, merged views of several runs, and anything else the reduce
/// side reads from implement this, so `MergeIterator` can take
/// `Vec<Box<dyn RecordIterator>>` and `GroupIterator` can sit on top of
/// either.
pub trait RecordIterator {
    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid record.
    fn is_valid(&self) -> bool;

    /// Advances to the next record.
    fn next(&mut self) -> Result<()>;
}
