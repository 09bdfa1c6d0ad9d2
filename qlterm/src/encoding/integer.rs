//! Varint helpers for compact u64 counts and lengths.
//!
//! Unsigned LEB128: the value is split into 7-bit chunks, least-significant first, and
//! every byte except the last has its MSB set. Values are read front to back.

/// Encode an unsigned 64-bit integer through `encoder`, returning the number of bytes written.
///
/// Notes:
/// - Value 0 encodes to a single byte `0x00`.
/// - The encoding for 128 is `[0x80, 0x01]` (digit 0 with continuation, then digit 1).
///
/// ```
/// use qlterm::encoding::integer::encode_u64;
/// let mut buf = Vec::new();
/// encode_u64(300, &mut |b: &[u8]| buf.extend_from_slice(b));
/// assert_eq!(&buf[..], &[0xac, 0x02]);
/// ```
pub fn encode_u64<F: FnMut(&[u8])>(mut value: u64, encoder: &mut F) -> u64 {
    let mut size = 1;
    while value >= 0x80 {
        encoder(&[((value & 0x7F) as u8) | 0x80]);
        value >>= 7;
        size += 1;
    }
    encoder(&[value as u8]);
    size
}

/// Decode one unsigned 64-bit integer from the front of `buf`.
///
/// Behavior:
/// - On success, returns `Some(value)` and advances `buf` past the encoded bytes.
/// - If the slice ends before a terminating byte (MSB = 0), returns `None` and `buf` is
///   left empty.
/// - Encodings longer than the 10 bytes a u64 can need are rejected with `None`.
pub fn decode_u64(buf: &mut &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    loop {
        let (&byte, rest) = buf.split_first()?;
        *buf = rest;
        if shift >= 64 {
            return None;
        }
        value |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            break Some(value);
        }
        shift += 7;
    }
}

/// Compute the encoded size in bytes of a u64 value using the varint scheme.
///
/// This is useful for preallocating buffers or estimating storage requirements
pub fn encoded_size_u64(value: u64) -> u64 {
    if value == 0 {
        return 1;
    }
    let sig_bits = (64 - value.leading_zeros()) as u64;
    sig_bits.div_ceil(7)
}
