use std::cmp::Ordering;

use crate::comparator::{compare_fields, expect_exhausted, KeyComparator, RawComparator};
use crate::error::Result;
use crate::writable::CompositeKey;

/// Orders serialized `CompositeKey`s by `first`, then `second`.
///
/// 1. Decode each side's first prefix to find where `first` ends.
/// 2. Compare the two `first` payloads; a difference decides the result.
/// 3. Otherwise compare the `second` fields in what remains of each range.
///
/// Both ranges are always walked to the end: each must hold exactly two
/// well-formed fields, whatever the first fields decide. A malformed key
/// fails against every other key, never against only some of them.
///
/// This is the default comparator registered for `CompositeKey`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullOrderComparator;

impl RawComparator for FullOrderComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (first_ord, first_a, first_b) = compare_fields(a, b)?;
        let (rest_a, rest_b) = (&a[first_a..], &b[first_b..]);
        let (second_ord, second_a, second_b) = compare_fields(rest_a, rest_b)?;
        expect_exhausted(rest_a, second_a)?;
        expect_exhausted(rest_b, second_b)?;
        Ok(first_ord.then(second_ord))
    }

    fn name(&self) -> &'static str {
        "full-order"
    }
}

impl KeyComparator<CompositeKey> for FullOrderComparator {
    fn compare_keys(&self, a: &CompositeKey, b: &CompositeKey) -> Ordering {
        a.cmp(b)
    }
}
