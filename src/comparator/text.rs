use std::cmp::Ordering;

use crate::comparator::{compare_fields, expect_exhausted, KeyComparator, RawComparator};
use crate::error::Result;

/// Orders serialized single-string keys by payload bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextComparator;

impl RawComparator for TextComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (ord, len_a, len_b) = compare_fields(a, b)?;
        expect_exhausted(a, len_a)?;
        expect_exhausted(b, len_b)?;
        Ok(ord)
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

impl KeyComparator<String> for TextComparator {
    fn compare_keys(&self, a: &String, b: &String) -> Ordering {
        a.cmp(b)
    }
}
