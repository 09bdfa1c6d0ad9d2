//! Tag bytes for datum payloads in the binary term formats.
//!
//! Conventions:
//! - Every datum starts with one tag byte, followed by its payload.
//! - Numbers are IEEE-754 doubles, little-endian.
//! - Strings, arrays and objects are length- or count-prefixed. The prefix is a varint in
//!   the current format and a little-endian u32 in legacy formats.
//! - `D_JSON` (legacy only, from v1.16 on) carries a whole datum as length-prefixed JSON text.

pub const D_NULL: u8 = 0x00;
pub const D_BOOL: u8 = 0x01;
pub const D_NUMBER: u8 = 0x02;
pub const D_STRING: u8 = 0x03;
pub const D_ARRAY: u8 = 0x04;
pub const D_OBJECT: u8 = 0x05;
pub const D_JSON: u8 = 0x06;

/// Bytes of the `i32` length envelope in front of a current-format tree.
pub const ENVELOPE_SIZE: usize = 4;
