//! Orderings over serialized keys.
//!
//! The sort phase never deserializes keys. It hands two byte ranges to a
//! `RawComparator`, which decodes just enough of each (the length prefixes)
//! to find field boundaries and compares payload bytes directly.
//!
//! Two strategies exist for composite keys:
//! - `FullOrderComparator` orders by both fields. Used to sort.
//! - `PrimaryFieldComparator` looks at `first` only. Used to decide where
//!   one reduce group ends and the next begins.
//!
//! Sorting with the first and grouping with the second is the secondary
//! sort: records sharing `first` arrive at one reducer, ordered by `second`.

pub mod full;
pub mod primary;
pub mod text;

use std::cmp::Ordering;

use crate::error::{DecodeError, Result};
use crate::varint::read_text_field;

pub use full::FullOrderComparator;
pub use primary::PrimaryFieldComparator;
pub use text::TextComparator;

/// Compares serialized keys.
///
/// Implementations are stateless and must never block: the sort calls them
/// from many threads, many times per record. A malformed input is an error,
/// never a guessed ordering.
pub trait RawComparator: Send + Sync {
    /// Order two serialized keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Check that `key` is well formed as far as this ordering reads it.
    ///
    /// Comparing a key with itself walks every field the comparator would
    /// ever look at.
    fn validate(&self, key: &[u8]) -> Result<()> {
        self.compare(key, key).map(|_| ())
    }
}

/// The same ordering applied to decoded keys.
///
/// For every pair of well-formed keys, `compare_keys` on the decoded values
/// and `compare` on their serialized forms agree.
pub trait KeyComparator<K>: RawComparator {
    fn compare_keys(&self, a: &K, b: &K) -> Ordering;
}

/// Compare the length-prefixed field at the start of `a` with the one at the
/// start of `b`.
///
/// Payloads are compared byte-wise with the prefixes skipped: comparing
/// prefixes too would put "b" before "ab". Returns the ordering plus the
/// bytes each field occupies.
pub fn compare_fields(a: &[u8], b: &[u8]) -> Result<(Ordering, usize, usize)> {
    let (payload_a, len_a) = read_text_field(a)?;
    let (payload_b, len_b) = read_text_field(b)?;
    Ok((payload_a.cmp(payload_b), len_a, len_b))
}

/// Fail if `data` has bytes after `consumed`.
pub(crate) fn expect_exhausted(data: &[u8], consumed: usize) -> Result<()> {
    match data.len() - consumed {
        0 => Ok(()),
        extra => Err(DecodeError::TrailingBytes(extra).into()),
    }
}
