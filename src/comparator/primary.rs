use std::cmp::Ordering;

use crate::comparator::{compare_fields, KeyComparator, RawComparator};
use crate::error::Result;
use crate::writable::CompositeKey;

/// Orders `CompositeKey`s by `first` alone.
///
/// Two keys are equal under this ordering iff their first fields are equal,
/// whatever their second fields hold. Nothing past the first field is read.
///
/// This is the grouping half of a secondary sort and is never registered
/// as a type's default; jobs select it explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryFieldComparator;

impl RawComparator for PrimaryFieldComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (ord, _, _) = compare_fields(a, b)?;
        Ok(ord)
    }

    fn name(&self) -> &'static str {
        "primary-field"
    }
}

impl KeyComparator<CompositeKey> for PrimaryFieldComparator {
    fn compare_keys(&self, a: &CompositeKey, b: &CompositeKey) -> Ordering {
        a.first().cmp(b.first())
    }
}
