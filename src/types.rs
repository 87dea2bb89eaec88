use crate::error::Result;
use crate::varint::{read_text_field, vlq_size, write_text_field};

/// Serialized key bytes.
pub type RawKey = Vec<u8>;

/// Serialized value bytes.
pub type RawValue = Vec<u8>;

/// One map output record as the shuffle sees it: two opaque byte strings.
///
/// Framed on disk as two length-prefixed fields:
/// ```text
/// ┌──────────────┬─────┬────────────────┬───────┐
/// │ VLQ(key len) │ key │ VLQ(value len) │ value │
/// └──────────────┴─────┴────────────────┴───────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: RawKey,
    pub value: RawValue,
}

impl Record {
    pub fn new(key: RawKey, value: RawValue) -> Self {
        Record { key, value }
    }

    /// Append the framed record to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        write_text_field(&self.key, buf);
        write_text_field(&self.value, buf);
    }

    /// Decode one framed record, returning (record, bytes consumed).
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (key, key_len) = read_text_field(data)?;
        let (value, value_len) = read_text_field(&data[key_len..])?;
        Ok((Record::new(key.to_vec(), value.to_vec()), key_len + value_len))
    }

    /// Size of this record when framed.
    pub fn encoded_size(&self) -> usize {
        vlq_size(self.key.len() as u64)
            + self.key.len()
            + vlq_size(self.value.len() as u64)
            + self.value.len()
    }
}
