pub mod pair;

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::comparator::text::TextComparator;
use crate::comparator::RawComparator;
use crate::error::{DecodeError, Result};
use crate::varint::{decode_vlq, encode_vlq, read_text_field, write_text_field};

pub use pair::{CompositeKey, CompositeKeyRef};

/// A value the shuffle can move as bytes.
///
/// `read_fields` overwrites `self` in place so one instance can be decoded
/// into repeatedly. It returns how many bytes of `data` it consumed; any
/// bytes after that belong to the caller.
pub trait Writable {
    /// Append the serialized form to `buf`.
    fn write_to(&self, buf: &mut Vec<u8>);

    /// Replace `self` with the value serialized at the start of `data`.
    fn read_fields(&mut self, data: &[u8]) -> Result<usize>;

    /// Serialize into a fresh buffer.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Decode a new value, returning (value, bytes consumed).
    fn decode(data: &[u8]) -> Result<(Self, usize)>
    where
        Self: Default + Sized,
    {
        let mut value = Self::default();
        let consumed = value.read_fields(data)?;
        Ok((value, consumed))
    }
}

/// A key type: serializable, totally ordered, and hashable for partitioning.
///
/// `raw_comparator` must order serialized bytes exactly as `Ord` orders
/// the decoded values.
pub trait WritableComparable: Writable + Ord + Default + 'static {
    /// Hash used to route the key to a reduce partition.
    fn hash_code(&self) -> u64;

    /// The type's default full-order comparator over serialized keys.
    fn raw_comparator() -> Arc<dyn RawComparator>;
}

/// Hash of one field's bytes. Shared by key hashing and partitioners.
pub fn field_hash(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// Strings travel as a single length-prefixed field.
impl Writable for String {
    fn write_to(&self, buf: &mut Vec<u8>) {
        write_text_field(self.as_bytes(), buf);
    }

    fn read_fields(&mut self, data: &[u8]) -> Result<usize> {
        let (payload, consumed) = read_text_field(data)?;
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
        self.clear();
        self.push_str(text);
        Ok(consumed)
    }
}

impl WritableComparable for String {
    fn hash_code(&self) -> u64 {
        field_hash(self.as_bytes())
    }

    fn raw_comparator() -> Arc<dyn RawComparator> {
        Arc::new(TextComparator)
    }
}

/// Counts travel as a bare VLQ.
impl Writable for u64 {
    fn write_to(&self, buf: &mut Vec<u8>) {
        encode_vlq(*self, buf);
    }

    fn read_fields(&mut self, data: &[u8]) -> Result<usize> {
        let (value, consumed) = decode_vlq(data)?;
        *self = value;
        Ok(consumed)
    }
}
