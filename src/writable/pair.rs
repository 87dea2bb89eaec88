use std::fmt;
use std::sync::Arc;

use crate::comparator::full::FullOrderComparator;
use crate::comparator::RawComparator;
use crate::error::{DecodeError, Result};
use crate::varint::{read_text_field, write_text_field};
use crate::writable::{field_hash, Writable, WritableComparable};

/// Odd multiplier applied to the first field's hash in `hash_code`.
pub const HASH_MULTIPLIER: u64 = 163;

/// A two-field shuffle key, ordered by `first` then `second`.
///
/// Serialized form:
/// ```text
/// ┌───────────────┬─────────────┬────────────────┬──────────────┐
/// │ VLQ(len first)│ first bytes │ VLQ(len second)│ second bytes │
/// └───────────────┴─────────────┴────────────────┴──────────────┘
/// ```
///
/// Producers may keep one instance and overwrite it with `set_first` /
/// `set_second` for every record. Anything that wants to hold on to a key
/// past the next overwrite has to clone it (collectors serialize on receipt,
/// which is the same thing).
///
/// The derived `Ord` compares `first`, then `second`, as UTF-8 bytes. That is
/// the order the raw comparators reproduce.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey {
    first: String,
    second: String,
}

impl CompositeKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        CompositeKey {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    /// Overwrite `first`, keeping the existing allocation.
    pub fn set_first(&mut self, first: &str) {
        self.first.clear();
        self.first.push_str(first);
    }

    /// Overwrite `second`, keeping the existing allocation.
    pub fn set_second(&mut self, second: &str) {
        self.second.clear();
        self.second.push_str(second);
    }

    pub fn set(&mut self, first: &str, second: &str) {
        self.set_first(first);
        self.set_second(second);
    }

    pub fn into_parts(self) -> (String, String) {
        (self.first, self.second)
    }

    /// Borrowed view of this key's fields.
    pub fn as_ref_key(&self) -> CompositeKeyRef<'_> {
        CompositeKeyRef {
            first: self.first.as_bytes(),
            second: self.second.as_bytes(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.first, self.second)
    }
}

impl Writable for CompositeKey {
    fn write_to(&self, buf: &mut Vec<u8>) {
        write_text_field(self.first.as_bytes(), buf);
        write_text_field(self.second.as_bytes(), buf);
    }

    /// Both fields are validated before either is assigned, so a failed
    /// decode leaves `self` untouched.
    fn read_fields(&mut self, data: &[u8]) -> Result<usize> {
        let (view, consumed) = CompositeKeyRef::parse(data)?;
        let first = std::str::from_utf8(view.first).map_err(|_| DecodeError::InvalidUtf8)?;
        let second = std::str::from_utf8(view.second).map_err(|_| DecodeError::InvalidUtf8)?;
        self.set(first, second);
        Ok(consumed)
    }
}

impl WritableComparable for CompositeKey {
    /// `hash(first) * 163 + hash(second)`, wrapping.
    fn hash_code(&self) -> u64 {
        field_hash(self.first.as_bytes())
            .wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(field_hash(self.second.as_bytes()))
    }

    fn raw_comparator() -> Arc<dyn RawComparator> {
        Arc::new(FullOrderComparator)
    }
}

/// A composite key read in place from a serialized buffer.
///
/// Valid only as long as the buffer it borrows. Call `to_owned_key` for a
/// snapshot that outlives it. Ordering is byte-wise per field, which agrees
/// with `CompositeKey`'s order for UTF-8 payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKeyRef<'a> {
    first: &'a [u8],
    second: &'a [u8],
}

impl<'a> CompositeKeyRef<'a> {
    /// Locate both fields at the start of `data`, returning (view, bytes consumed).
    pub fn parse(data: &'a [u8]) -> Result<(Self, usize)> {
        let (first, first_len) = read_text_field(data)?;
        let (second, second_len) = read_text_field(&data[first_len..])?;
        Ok((CompositeKeyRef { first, second }, first_len + second_len))
    }

    pub fn first(&self) -> &'a [u8] {
        self.first
    }

    pub fn second(&self) -> &'a [u8] {
        self.second
    }

    /// Copy into an owned key. Fails if either field is not UTF-8.
    pub fn to_owned_key(&self) -> Result<CompositeKey> {
        let first = std::str::from_utf8(self.first).map_err(|_| DecodeError::InvalidUtf8)?;
        let second = std::str::from_utf8(self.second).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(CompositeKey::new(first, second))
    }
}
