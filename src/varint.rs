//! Length prefixes for serialized fields.
//!
//! A prefix is an unsigned little-endian base-128 integer: 7 data bits per
//! byte, high bit set on every byte except the last.
//!
//! ```text
//! 5      → 0x05
//! 300    → 0xAC 0x02
//! ```

use crate::error::{DecodeError, Result};

/// A u64 never needs more than 10 prefix bytes.
pub const MAX_VLQ_LEN: usize = 10;

/// Append `value` to `buf` as a VLQ.
pub fn encode_vlq(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Number of bytes `encode_vlq` writes for `value`.
pub fn vlq_size(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Decode a VLQ from the start of `data`, returning (value, bytes consumed).
pub fn decode_vlq(data: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().take(MAX_VLQ_LEN).enumerate() {
        // The tenth byte may only carry the single remaining bit.
        if i == MAX_VLQ_LEN - 1 && byte > 0x01 {
            return Err(DecodeError::VarintOverflow.into());
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if data.len() >= MAX_VLQ_LEN {
        Err(DecodeError::VarintOverflow.into())
    } else {
        Err(DecodeError::UnexpectedEof.into())
    }
}

/// Locate one length-prefixed field at the start of `data`.
///
/// Returns the payload and the total bytes the field occupies (prefix
/// included). Only the prefix is decoded; the payload is not inspected.
pub fn read_text_field(data: &[u8]) -> Result<(&[u8], usize)> {
    let (declared, prefix_len) = decode_vlq(data)?;
    let remaining = data.len() - prefix_len;
    if declared > remaining as u64 {
        return Err(DecodeError::LengthOutOfBounds {
            declared,
            remaining,
        }
        .into());
    }
    let end = prefix_len + declared as usize;
    Ok((&data[prefix_len..end], end))
}

/// Append one length-prefixed field.
pub fn write_text_field(payload: &[u8], buf: &mut Vec<u8>) {
    encode_vlq(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}
